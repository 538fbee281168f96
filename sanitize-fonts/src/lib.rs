//! Validate the tables of untrusted fonts and re-encode them.
//!
//! Every table with a sanitizer is parsed with bounds-checked reads,
//! checked against the format's constraints and the tables it depends on,
//! and then written out again from the validated values. Nothing from the
//! input reaches the output without passing through a sanitizer, unless
//! pass-through of unrecognized tables is explicitly requested.
//!
//! A table that fails validation either drops (the font is usable without
//! it) or errors (the input is corrupt). See [`Severity`].
//!
//! ```no_run
//! let data = std::fs::read("font.ttf").unwrap();
//! let sanitized = sanitize_fonts::sanitize_font(&data, &Default::default()).unwrap();
//! ```

mod error;
mod font;
pub mod font_builder;
pub mod font_data;
pub mod font_file;
pub mod hdmx;
pub mod head;
pub mod maxp;
pub mod serialize;
mod table;

use std::collections::{BTreeMap, BTreeSet};

use font_types::Tag;

pub use error::{SanitizeError, Severity, TableError};
pub use font::{Font, TableEntry};
pub use table::{Passthrough, Sanitize, SanitizedTable};

use font_builder::{CollectionBuilder, FontBuilder};
use font_data::FontData;
use font_file::{FileRef, FontRef};
use serialize::Serializer;

pub const HEAD: Tag = Tag::new(b"head");
pub const MAXP: Tag = Tag::new(b"maxp");
pub const HDMX: Tag = Tag::new(b"hdmx");
pub const GLYF: Tag = Tag::new(b"glyf");

/// Tables other tables depend on, sanitized first and in this order.
///
/// A font that loses any of these is rejected.
const PREREQUISITES: [Tag; 2] = [HEAD, MAXP];

/// The default limit on the size of a single serialized table.
pub const DEFAULT_MAX_TABLE_SIZE: usize = 64 * 1024 * 1024;

#[derive(Clone, Copy, Debug)]
pub struct SanitizeFlags(u16);

impl SanitizeFlags {
    //all flags at their default value of false.
    pub const SANITIZE_FLAGS_DEFAULT: Self = Self(0x0000);

    //If set a table that errors is dropped and sanitizing continues.
    //Otherwise an error in any table fails the whole font.
    pub const SANITIZE_FLAGS_DROP_ERRORED_TABLES: Self = Self(0x0001);

    //If set tables without a sanitizer are copied to the output untouched.
    //Otherwise they are dropped.
    pub const SANITIZE_FLAGS_PASSTHROUGH_UNRECOGNIZED: Self = Self(0x0002);

    /// Returns `true` if all of the flags in `other` are contained within `self`.
    #[inline]
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl Default for SanitizeFlags {
    fn default() -> Self {
        Self::SANITIZE_FLAGS_DEFAULT
    }
}

impl PartialEq for SanitizeFlags {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::ops::BitOr for SanitizeFlags {
    type Output = Self;

    /// Returns the union of the two sets of flags.
    #[inline]
    fn bitor(self, other: SanitizeFlags) -> Self {
        Self(self.0 | other.0)
    }
}

impl From<u16> for SanitizeFlags {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl std::ops::BitOrAssign for SanitizeFlags {
    /// Adds the set of flags.
    #[inline]
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// Settings that control how fonts are sanitized.
#[derive(Clone, Debug)]
pub struct Options {
    pub flags: SanitizeFlags,
    /// Tables removed before sanitizing.
    pub drop_tables: BTreeSet<Tag>,
    /// The largest table that may be written, in bytes.
    pub max_table_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            flags: SanitizeFlags::default(),
            drop_tables: BTreeSet::new(),
            max_table_size: DEFAULT_MAX_TABLE_SIZE,
        }
    }
}

impl Options {
    fn drop_errored(&self) -> bool {
        self.flags
            .contains(SanitizeFlags::SANITIZE_FLAGS_DROP_ERRORED_TABLES)
    }

    fn passthrough_unrecognized(&self) -> bool {
        self.flags
            .contains(SanitizeFlags::SANITIZE_FLAGS_PASSTHROUGH_UNRECOGNIZED)
    }
}

//parse input tag list string, which is a comma/whitespace-separated list of table tags
pub fn parse_tag_list(input_str: &str) -> Result<BTreeSet<Tag>, SanitizeError> {
    input_str
        .split(&[',', ' '])
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            Tag::new_checked(raw.as_bytes())
                .map_err(|_| SanitizeError::InvalidTag(raw.to_owned()))
        })
        .collect()
}

/// Sanitize a font or font collection, returning the re-encoded file.
pub fn sanitize_font(data: &[u8], options: &Options) -> Result<Vec<u8>, SanitizeError> {
    let file = FileRef::new(data)?;
    let font_refs = file.fonts()?;
    let fonts = sanitize_font_refs(&font_refs, options)?;

    if let FileRef::Font(font_ref) = &file {
        let mut builder = FontBuilder::new(font_ref.table_directory().sfnt_version());
        for font in &fonts {
            for (tag, table) in tables_to_write(font) {
                match serialize_table(tag, table, font, options) {
                    Ok(bytes) => {
                        builder.add_raw(tag, bytes);
                    }
                    Err(err) => handle_failure(tag, err, options)?,
                }
            }
        }
        check_required(|tag| builder.contains(tag))?;
        return Ok(builder.build());
    }

    let mut builder = CollectionBuilder::new();
    for (font, font_ref) in fonts.iter().zip(&font_refs) {
        builder.add_font(font_ref.table_directory().sfnt_version());
        let mut written = BTreeSet::new();
        for (tag, table) in tables_to_write(font) {
            let Some(shared) = font.shared_table(tag) else {
                continue;
            };
            // one blob per table instance, however many fonts hold it
            let key = std::sync::Arc::as_ptr(shared) as usize;
            match builder.add_shared(tag, key, || serialize_table(tag, table, font, options)) {
                Ok(_) => {
                    written.insert(tag);
                }
                Err(err) => handle_failure(tag, err, options)?,
            }
        }
        check_required(|tag| written.contains(&tag))?;
    }
    Ok(builder.build())
}

/// Sanitize every font in a file, without writing them.
///
/// In a collection, a table that several fonts point at is parsed once and
/// shared between them.
pub fn sanitize_fonts(data: &[u8], options: &Options) -> Result<Vec<Font>, SanitizeError> {
    let file = FileRef::new(data)?;
    sanitize_font_refs(&file.fonts()?, options)
}

/// Sanitize a single font given as a list of tables.
///
/// This is for callers that locate tables themselves; the only container
/// check is that no tag appears twice.
pub fn sanitize_tables<'a>(
    tables: impl IntoIterator<Item = (Tag, FontData<'a>)>,
    options: &Options,
) -> Result<Font, SanitizeError> {
    let mut seen = BTreeSet::new();
    let inputs = tables
        .into_iter()
        .map(|(tag, data)| {
            if !seen.insert(tag) {
                return Err(SanitizeError::DuplicateTable(tag));
            }
            Ok(TableInput {
                tag,
                data,
                location: None,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    sanitize_one(inputs, options, &[], &mut BTreeMap::new())
}

/// Where a table's bytes live in the input file: tag, offset and length.
///
/// Tables with equal locations are byte-for-byte identical.
type TableLocation = (Tag, u32, u32);

struct TableInput<'a> {
    tag: Tag,
    data: FontData<'a>,
    location: Option<TableLocation>,
}

fn sanitize_font_refs(
    font_refs: &[FontRef],
    options: &Options,
) -> Result<Vec<Font>, SanitizeError> {
    let mut fonts: Vec<Font> = Vec::with_capacity(font_refs.len());
    let mut parsed = BTreeMap::new();
    for (i, font_ref) in font_refs.iter().enumerate() {
        let inputs = font_ref
            .table_directory()
            .table_records()
            .iter()
            .map(|record| -> Result<_, SanitizeError> {
                Ok(TableInput {
                    tag: record.tag,
                    data: font_ref.table_data(record)?,
                    location: Some((record.tag, record.offset, record.length)),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("Sanitizing font {i}");
        let font = sanitize_one(inputs, options, &fonts, &mut parsed)?;
        fonts.push(font);
    }
    Ok(fonts)
}

/// Sanitize the tables of one font.
///
/// `previous` holds the fonts already sanitized from the same file, and
/// `parsed` maps the location of each table they parsed to the index of
/// the font that holds it.
fn sanitize_one(
    mut inputs: Vec<TableInput>,
    options: &Options,
    previous: &[Font],
    parsed: &mut BTreeMap<TableLocation, usize>,
) -> Result<Font, SanitizeError> {
    // stable, so everything else stays in directory order
    inputs.sort_by_key(|input| processing_rank(input.tag));

    let mut font = Font::new();
    for input in inputs {
        let tag = input.tag;
        if options.drop_tables.contains(&tag) {
            log::info!("Dropping table '{tag}'");
            continue;
        }

        let source = input
            .location
            .and_then(|location| parsed.get(&location))
            .map(|idx| (*idx, &previous[*idx]));
        if let Some((idx, source)) = source {
            if can_reuse(&font, source, tag) && font.reuse_table(source, tag) {
                log::debug!("Reusing '{tag}' from font {idx}");
                continue;
            }
        }

        match table::sanitize_table(tag, input.data, &font, options.passthrough_unrecognized()) {
            None => log::info!("Dropping unrecognized table '{tag}'"),
            Some(Ok(table)) => {
                log::debug!("Sanitized '{tag}'");
                font.insert(table);
                if let Some(location) = input.location {
                    parsed.entry(location).or_insert(previous.len());
                }
            }
            Some(Err(err)) => handle_failure(tag, err, options)?,
        }
    }
    check_required(|tag| font.has_table(tag))?;
    Ok(font)
}

fn processing_rank(tag: Tag) -> usize {
    PREREQUISITES
        .iter()
        .position(|prereq| *prereq == tag)
        .unwrap_or(PREREQUISITES.len())
}

/// A table that was validated against other tables may only be shared if
/// those tables are shared too.
fn can_reuse(font: &Font, source: &Font, tag: Tag) -> bool {
    match source.get(tag) {
        Some(table) if table.has_prerequisites() => PREREQUISITES
            .iter()
            .all(|prereq| font.shares_table(source, *prereq)),
        Some(_) => true,
        None => false,
    }
}

/// Apply the drop/error policy to a failed table.
fn handle_failure(tag: Tag, err: TableError, options: &Options) -> Result<(), SanitizeError> {
    match err.severity() {
        Severity::Drop => {
            log::info!("'{tag}': {err}");
            Ok(())
        }
        Severity::Error if options.drop_errored() && !PREREQUISITES.contains(&tag) => {
            log::warn!("Dropping '{tag}' after error: {err}");
            Ok(())
        }
        Severity::Error => {
            log::warn!("'{tag}' failed to sanitize: {err}");
            Err(SanitizeError::Table { tag, source: err })
        }
    }
}

fn check_required(has_table: impl Fn(Tag) -> bool) -> Result<(), SanitizeError> {
    match PREREQUISITES.iter().find(|tag| !has_table(**tag)) {
        Some(tag) => Err(SanitizeError::MissingRequiredTable(*tag)),
        None => Ok(()),
    }
}

fn tables_to_write(font: &Font) -> impl Iterator<Item = (Tag, &SanitizedTable)> + '_ {
    font.entries().filter_map(move |(tag, entry)| {
        let table = entry.table();
        if table.should_serialize(font) {
            Some((tag, table))
        } else {
            log::debug!("Not writing '{tag}'");
            None
        }
    })
}

fn serialize_table(
    tag: Tag,
    table: &SanitizedTable,
    font: &Font,
    options: &Options,
) -> Result<Vec<u8>, TableError> {
    let mut s = Serializer::new(options.max_table_size);
    table.serialize(font, &mut s)?;
    s.copy_bytes()
        .map_err(TableError::write(format!("'{tag}' table")))
}
