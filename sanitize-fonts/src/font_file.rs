//! Walking the table directories of an sfnt font or a font collection.

use std::collections::BTreeSet;

use font_types::Tag;

use crate::{
    error::SanitizeError,
    font_data::{FontData, ReadError},
};

/// The sfnt version of fonts with TrueType outlines.
pub const TT_SFNT_VERSION: u32 = 0x0001_0000;
/// The sfnt version of fonts with CFF outlines ('OTTO').
pub const CFF_SFNT_VERSION: u32 = 0x4F54_544F;
/// The sfnt version used by some older Apple fonts ('true').
pub const TRUE_SFNT_VERSION: u32 = 0x7472_7565;
/// The tag at the start of a font collection.
pub const TTC_HEADER_TAG: Tag = Tag::new(b"ttcf");

const TABLE_RECORD_LEN: usize = 16;
// sfntVersion, numTables, searchRange, entrySelector, rangeShift
const TABLE_DIRECTORY_HEADER_LEN: usize = 12;

/// One entry of a table directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TableRecord {
    pub tag: Tag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

/// The table directory at the start of each font.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDirectory {
    sfnt_version: u32,
    table_records: Vec<TableRecord>,
}

impl TableDirectory {
    /// Read a table directory starting at the beginning of `data`.
    pub fn read(data: FontData) -> Result<Self, SanitizeError> {
        let mut cursor = data.cursor();
        let sfnt_version: u32 = cursor.read()?;
        if !matches!(
            sfnt_version,
            TT_SFNT_VERSION | CFF_SFNT_VERSION | TRUE_SFNT_VERSION
        ) {
            return Err(SanitizeError::UnsupportedVersion(sfnt_version));
        }
        let num_tables: u16 = cursor.read()?;
        // the binary search fields are recomputed on output
        cursor.skip(6)?;

        let records_len = num_tables as usize * TABLE_RECORD_LEN;
        if cursor.remaining_bytes() < records_len {
            return Err(ReadError::OutOfBounds.into());
        }
        let mut table_records = Vec::with_capacity(num_tables as usize);
        let mut seen = BTreeSet::new();
        for _ in 0..num_tables {
            let record = TableRecord {
                tag: cursor.read()?,
                checksum: cursor.read()?,
                offset: cursor.read()?,
                length: cursor.read()?,
            };
            if !seen.insert(record.tag) {
                return Err(SanitizeError::DuplicateTable(record.tag));
            }
            table_records.push(record);
        }
        Ok(TableDirectory {
            sfnt_version,
            table_records,
        })
    }

    pub fn sfnt_version(&self) -> u32 {
        self.sfnt_version
    }

    /// The table records, in the order they appear in the file.
    pub fn table_records(&self) -> &[TableRecord] {
        &self.table_records
    }

    /// The length in bytes of a directory with this many tables.
    pub fn len_for(num_tables: usize) -> usize {
        TABLE_DIRECTORY_HEADER_LEN + num_tables * TABLE_RECORD_LEN
    }
}

/// A single font, inside a file that may hold several.
#[derive(Clone, Debug)]
pub struct FontRef<'a> {
    data: FontData<'a>,
    table_directory: TableDirectory,
}

impl<'a> FontRef<'a> {
    /// Read a font whose table directory is at the start of `data`.
    pub fn new(data: &'a [u8]) -> Result<Self, SanitizeError> {
        let data = FontData::new(data);
        Self::with_table_directory(data, TableDirectory::read(data)?)
    }

    fn with_table_directory(
        data: FontData<'a>,
        table_directory: TableDirectory,
    ) -> Result<Self, SanitizeError> {
        Ok(FontRef {
            data,
            table_directory,
        })
    }

    pub fn table_directory(&self) -> &TableDirectory {
        &self.table_directory
    }

    /// The data of the table described by `record`.
    ///
    /// Offsets are relative to the start of the file, for collections as
    /// well as single fonts.
    pub fn table_data(&self, record: &TableRecord) -> Result<FontData<'a>, ReadError> {
        self.data
            .slice_len(record.offset as usize, record.length as usize)
    }

    /// The data for the table with this tag, if it is present and in bounds.
    pub fn data_for_tag(&self, tag: Tag) -> Option<FontData<'a>> {
        self.table_directory
            .table_records()
            .iter()
            .find(|record| record.tag == tag)
            .and_then(|record| self.table_data(record).ok())
    }
}

/// A font collection ('ttcf').
#[derive(Clone, Debug)]
pub struct CollectionRef<'a> {
    data: FontData<'a>,
    table_directory_offsets: Vec<u32>,
}

impl<'a> CollectionRef<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, SanitizeError> {
        let data = FontData::new(data);
        let mut cursor = data.cursor();
        let tag: Tag = cursor.read()?;
        if tag != TTC_HEADER_TAG {
            return Err(SanitizeError::InvalidTag(tag.to_string()));
        }
        let version: u32 = cursor.read()?;
        if version != 0x0001_0000 && version != 0x0002_0000 {
            return Err(SanitizeError::UnsupportedVersion(version));
        }
        let num_fonts: u32 = cursor.read()?;
        if num_fonts == 0 {
            return Err(SanitizeError::NoFonts);
        }
        let offsets_len = (num_fonts as usize)
            .checked_mul(4)
            .ok_or(ReadError::LengthOverflow)?;
        if cursor.remaining_bytes() < offsets_len {
            return Err(ReadError::OutOfBounds.into());
        }
        let table_directory_offsets = (0..num_fonts)
            .map(|_| cursor.read::<u32>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CollectionRef {
            data,
            table_directory_offsets,
        })
    }

    pub fn len(&self) -> usize {
        self.table_directory_offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table_directory_offsets.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<FontRef<'a>, SanitizeError> {
        let offset = *self
            .table_directory_offsets
            .get(index)
            .ok_or(ReadError::OutOfBounds)? as usize;
        let table_dir_data = self.data.split_off(offset).ok_or(ReadError::OutOfBounds)?;
        FontRef::with_table_directory(self.data, TableDirectory::read(table_dir_data)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<FontRef<'a>, SanitizeError>> + '_ {
        (0..self.len()).map(move |ix| self.get(ix))
    }
}

/// Either a single font or a collection.
#[derive(Clone, Debug)]
pub enum FileRef<'a> {
    Font(FontRef<'a>),
    Collection(CollectionRef<'a>),
}

impl<'a> FileRef<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, SanitizeError> {
        let tag: Tag = FontData::new(data).read_at(0)?;
        Ok(if tag == TTC_HEADER_TAG {
            Self::Collection(CollectionRef::new(data)?)
        } else {
            Self::Font(FontRef::new(data)?)
        })
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FileRef::Collection(_))
    }

    /// Every font in the file, in order.
    pub fn fonts(&self) -> Result<Vec<FontRef<'a>>, SanitizeError> {
        match self {
            FileRef::Font(font) => Ok(vec![font.clone()]),
            FileRef::Collection(collection) => collection.iter().collect(),
        }
    }
}
