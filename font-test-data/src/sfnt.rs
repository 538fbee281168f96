//! Assemble fonts and font collections from raw table data.
//!
//! Unlike the writer in sanitize-fonts, this makes no attempt to produce
//! well-formed output: tables are written in the order given, so tests can
//! produce unsorted or duplicated directories.

use font_types::Tag;

/// The sfnt version of fonts with TrueType outlines.
pub const TRUETYPE: u32 = 0x0001_0000;
/// The sfnt version of fonts with CFF outlines ('OTTO').
pub const CFF: u32 = 0x4F54_544F;

const TABLE_RECORD_LEN: usize = 16;
const HEADER_LEN: usize = 12;

/// Build a single font with a TrueType sfnt version.
pub fn font(tables: &[(Tag, &[u8])]) -> Vec<u8> {
    font_with_version(TRUETYPE, tables)
}

/// Build a single font with the given sfnt version.
pub fn font_with_version(sfnt_version: u32, tables: &[(Tag, &[u8])]) -> Vec<u8> {
    let mut layout = Layout::default();
    let offsets: Vec<_> = tables
        .iter()
        .map(|(_, data)| layout.add_blob(data))
        .collect();
    let directory_len = directory_len(tables.len());
    let mut out = Vec::new();
    write_directory(
        &mut out,
        sfnt_version,
        tables,
        &offsets,
        directory_len as u32,
    );
    layout.write_blobs(&mut out);
    out
}

/// Build a TrueType collection.
///
/// Tables with identical tags and contents are stored once and shared by
/// every font that lists them.
pub fn collection(fonts: &[&[(Tag, &[u8])]]) -> Vec<u8> {
    let mut layout = Layout::default();
    let offsets: Vec<Vec<u32>> = fonts
        .iter()
        .map(|tables| {
            tables
                .iter()
                .map(|(_, data)| layout.add_blob(data))
                .collect()
        })
        .collect();

    let ttc_header_len = HEADER_LEN + 4 * fonts.len();
    let directories_len: usize = fonts.iter().map(|tables| directory_len(tables.len())).sum();
    let data_start = (ttc_header_len + directories_len) as u32;

    let mut out = Vec::new();
    out.extend_from_slice(b"ttcf");
    out.extend_from_slice(&0x0001_0000_u32.to_be_bytes());
    out.extend_from_slice(&(fonts.len() as u32).to_be_bytes());
    let mut directory_offset = ttc_header_len;
    for tables in fonts {
        out.extend_from_slice(&(directory_offset as u32).to_be_bytes());
        directory_offset += directory_len(tables.len());
    }
    for (tables, offsets) in fonts.iter().zip(&offsets) {
        write_directory(&mut out, TRUETYPE, tables, offsets, data_start);
    }
    layout.write_blobs(&mut out);
    out
}

/// The checksum of a table, as stored in a table record.
pub fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0_u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

fn directory_len(num_tables: usize) -> usize {
    HEADER_LEN + num_tables * TABLE_RECORD_LEN
}

/// Table data, deduplicated, with offsets relative to the first blob.
#[derive(Default)]
struct Layout<'a> {
    blobs: Vec<&'a [u8]>,
    offsets: Vec<u32>,
    len: u32,
}

impl<'a> Layout<'a> {
    fn add_blob(&mut self, data: &'a [u8]) -> u32 {
        if let Some(idx) = self.blobs.iter().position(|blob| *blob == data) {
            return self.offsets[idx];
        }
        let offset = self.len;
        self.blobs.push(data);
        self.offsets.push(offset);
        self.len += round4(data.len()) as u32;
        offset
    }

    fn write_blobs(&self, out: &mut Vec<u8>) {
        for blob in &self.blobs {
            out.extend_from_slice(blob);
            out.resize(out.len() + round4(blob.len()) - blob.len(), 0);
        }
    }
}

fn write_directory(
    out: &mut Vec<u8>,
    sfnt_version: u32,
    tables: &[(Tag, &[u8])],
    offsets: &[u32],
    data_start: u32,
) {
    let num_tables = tables.len() as u16;
    let entry_selector = (num_tables.max(1)).ilog2() as u16;
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = (num_tables * 16).saturating_sub(search_range);

    out.extend_from_slice(&sfnt_version.to_be_bytes());
    for value in [num_tables, search_range, entry_selector, range_shift] {
        out.extend_from_slice(&value.to_be_bytes());
    }
    for ((tag, data), offset) in tables.iter().zip(offsets) {
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&checksum(data).to_be_bytes());
        out.extend_from_slice(&(data_start + offset).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    }
}

fn round4(len: usize) -> usize {
    (len + 3) & !3
}
