//! test data shared by the sanitize-fonts tests.
//!
//! Tables are produced as [`TableData`], with the interesting fields named
//! so that tests can corrupt them with [`TableData::set`].

use font_types::{Fixed, LongDateTime};

pub mod sfnt;
mod table_data;

pub use table_data::TableData;

/// A version 1.0 `head` table with the given flags.
///
/// Units per em is 1024, the bounding box is (-100, -200, 900, 800), and
/// `loca` offsets are short.
pub fn head(flags: u16) -> TableData {
    TableData::new()
        .field("major_version", 1_u16)
        .scalar(0_u16)
        .scalar(Fixed::ONE)
        .field("checksum_adjustment", 0_u32)
        .field("magic_number", 0x5F0F3CF5_u32)
        .field("flags", flags)
        .field("units_per_em", 1024_u16)
        .scalar(LongDateTime::new(3_600_000_000))
        .scalar(LongDateTime::new(3_700_000_000))
        .field("x_min", -100_i16)
        .field("y_min", -200_i16)
        .field("x_max", 900_i16)
        .field("y_max", 800_i16)
        .field("mac_style", 0_u16)
        .scalar(8_u16) // lowestRecPPEM
        .field("font_direction_hint", 2_i16)
        .field("index_to_loc_format", 0_i16)
        .field("glyph_data_format", 0_i16)
}

/// A version 1.0 (TrueType) `maxp` table.
pub fn maxp(num_glyphs: u16) -> TableData {
    TableData::new()
        .field("version", 0x0001_0000_u32)
        .field("num_glyphs", num_glyphs)
        .scalars([64_u16, 4, 0, 0]) // points, contours, composite points/contours
        .field("max_zones", 2_u16)
        .scalars([16_u16, 32, 8, 0, 128, 256, 0, 0])
}

/// A version 0.5 (CFF) `maxp` table.
pub fn maxp_cff(num_glyphs: u16) -> TableData {
    TableData::new()
        .field("version", 0x0000_5000_u32)
        .field("num_glyphs", num_glyphs)
}

/// One device record of an `hdmx` fixture.
#[derive(Clone, Copy, Debug)]
pub struct HdmxRecord<'a> {
    pub pixel_size: u8,
    pub max_width: u8,
    pub widths: &'a [u8],
}

impl<'a> From<(u8, u8, &'a [u8])> for HdmxRecord<'a> {
    fn from((pixel_size, max_width, widths): (u8, u8, &'a [u8])) -> Self {
        HdmxRecord {
            pixel_size,
            max_width,
            widths,
        }
    }
}

/// An `hdmx` table.
///
/// Each record is `(pixel_size, max_width, widths)`, padded with zeros up
/// to `size_device_record`. Record `i` names its fields `pixel_size_{i}`,
/// `max_width_{i}` and, when there is padding, `padding_{i}` for the first
/// padding byte.
pub fn hdmx(size_device_record: i32, records: &[(u8, u8, &[u8])]) -> TableData {
    let table = TableData::new()
        .field("version", 0_u16)
        .field("num_records", records.len() as i16)
        .field("size_device_record", size_device_record);
    records
        .iter()
        .enumerate()
        .fold(table, |table, (i, record)| {
            hdmx_record(table, i, (*record).into(), size_device_record)
        })
}

fn hdmx_record(table: TableData, i: usize, record: HdmxRecord, record_size: i32) -> TableData {
    let table = table
        .field(format!("pixel_size_{i}"), record.pixel_size)
        .field(format!("max_width_{i}"), record.max_width)
        .bytes(record.widths);
    let pad_len = (record_size - record.widths.len() as i32 - 2).max(0) as usize;
    if pad_len == 0 {
        return table;
    }
    table
        .field(format!("padding_{i}"), 0_u8)
        .bytes(&vec![0; pad_len - 1])
}
