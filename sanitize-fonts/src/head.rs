//! The [head](https://docs.microsoft.com/en-us/typography/opentype/spec/head) table

use font_types::{Fixed, LongDateTime, Tag};

use crate::{
    error::TableError, font::Font, font_data::FontData, serialize::Serializer, table::Sanitize,
};

const MAGIC_NUMBER: u32 = 0x5F0F3CF5;
// defined flag bits: 0..=4 and 11..=13
const DEFINED_FLAGS: u16 = 0x381F;
const DEFINED_MAC_STYLE: u16 = 0x007F;
const MIN_UNITS_PER_EM: u16 = 16;
const MAX_UNITS_PER_EM: u16 = 16384;
// deprecated; always written as 2
const FONT_DIRECTION_HINT: i16 = 2;

/// Named bits of `head.flags`.
///
/// | bit | value | meaning |
/// |-----|-------|---------|
/// | 0 | 0x0001 | baseline at y=0 |
/// | 1 | 0x0002 | left sidebearing point at x=0 |
/// | 2 | 0x0004 | instructions may depend on point size |
/// | 3 | 0x0008 | force ppem to integer values |
/// | 4 | 0x0010 | instructions may alter advance width |
pub mod flags {
    pub const BASELINE_AT_Y0: u16 = 0x0001;
    pub const LSB_AT_X0: u16 = 0x0002;
    pub const INSTRUCTIONS_DEPEND_ON_SIZE: u16 = 0x0004;
    pub const FORCE_INTEGER_PPEM: u16 = 0x0008;
    pub const INSTRUCTIONS_ALTER_ADVANCE: u16 = 0x0010;
}

/// A validated `head` table.
#[derive(Clone, Debug, PartialEq)]
pub struct Head {
    minor_version: u16,
    font_revision: Fixed,
    flags: u16,
    units_per_em: u16,
    created: LongDateTime,
    modified: LongDateTime,
    x_min: i16,
    y_min: i16,
    x_max: i16,
    y_max: i16,
    mac_style: u16,
    lowest_rec_ppem: u16,
    index_to_loc_format: i16,
}

impl Head {
    /// The flags, with undefined bits cleared.
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// `true` if every bit of `mask` is set in `flags`.
    pub fn has_flags(&self, mask: u16) -> bool {
        self.flags & mask == mask
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn font_revision(&self) -> Fixed {
        self.font_revision
    }

    pub fn created(&self) -> LongDateTime {
        self.created
    }

    pub fn modified(&self) -> LongDateTime {
        self.modified
    }

    pub fn mac_style(&self) -> u16 {
        self.mac_style
    }

    pub fn lowest_rec_ppem(&self) -> u16 {
        self.lowest_rec_ppem
    }

    /// 0 for short `loca` offsets, 1 for long.
    pub fn index_to_loc_format(&self) -> i16 {
        self.index_to_loc_format
    }

    /// The glyph bounding box as `(x_min, y_min, x_max, y_max)`.
    pub fn bounds(&self) -> (i16, i16, i16, i16) {
        (self.x_min, self.y_min, self.x_max, self.y_max)
    }
}

impl Sanitize for Head {
    const TAG: Tag = Tag::new(b"head");

    fn sanitize(data: FontData, _font: &Font) -> Result<Self, TableError> {
        let mut cursor = data.cursor();
        let short_read = || TableError::short_read("head table");

        let major_version: u16 = cursor.read().map_err(short_read())?;
        let minor_version: u16 = cursor.read().map_err(short_read())?;
        if major_version != 1 {
            return Err(TableError::Malformed(format!(
                "Bad head table version: {major_version}"
            )));
        }
        let font_revision: Fixed = cursor.read().map_err(short_read())?;
        // checkSumAdjustment is recomputed when the font is written
        let _checksum_adjustment: u32 = cursor.read().map_err(short_read())?;
        let magic_number: u32 = cursor.read().map_err(short_read())?;
        if magic_number != MAGIC_NUMBER {
            return Err(TableError::Malformed(format!(
                "Failed to read font magic number: 0x{magic_number:08X}"
            )));
        }
        let flags = cursor.read::<u16>().map_err(short_read())? & DEFINED_FLAGS;
        let units_per_em: u16 = cursor.read().map_err(short_read())?;
        if !(MIN_UNITS_PER_EM..=MAX_UNITS_PER_EM).contains(&units_per_em) {
            return Err(TableError::Malformed(format!(
                "Bad units per em: {units_per_em}"
            )));
        }
        let created: LongDateTime = cursor.read().map_err(short_read())?;
        let modified: LongDateTime = cursor.read().map_err(short_read())?;
        let x_min: i16 = cursor.read().map_err(short_read())?;
        let y_min: i16 = cursor.read().map_err(short_read())?;
        let x_max: i16 = cursor.read().map_err(short_read())?;
        let y_max: i16 = cursor.read().map_err(short_read())?;
        if x_min > x_max {
            return Err(TableError::Malformed(format!(
                "Bad x dimension in the font bounding box ({x_min}, {x_max})"
            )));
        }
        if y_min > y_max {
            return Err(TableError::Malformed(format!(
                "Bad y dimension in the font bounding box ({y_min}, {y_max})"
            )));
        }
        let mac_style = cursor.read::<u16>().map_err(short_read())? & DEFINED_MAC_STYLE;
        let lowest_rec_ppem: u16 = cursor.read().map_err(short_read())?;
        let _font_direction_hint: i16 = cursor.read().map_err(short_read())?;
        let index_to_loc_format: i16 = cursor.read().map_err(short_read())?;
        if !(0..=1).contains(&index_to_loc_format) {
            return Err(TableError::Malformed(format!(
                "Bad index to loc format: {index_to_loc_format}"
            )));
        }
        let glyph_data_format: i16 = cursor.read().map_err(short_read())?;
        if glyph_data_format != 0 {
            return Err(TableError::Malformed(format!(
                "Bad glyph data format: {glyph_data_format}"
            )));
        }

        Ok(Head {
            minor_version,
            font_revision,
            flags,
            units_per_em,
            created,
            modified,
            x_min,
            y_min,
            x_max,
            y_max,
            mac_style,
            lowest_rec_ppem,
            index_to_loc_format,
        })
    }

    fn serialize(&self, _font: &Font, s: &mut Serializer) -> Result<(), TableError> {
        let write = || TableError::write("head table");
        s.embed(1_u16).map_err(write())?;
        s.embed(self.minor_version).map_err(write())?;
        s.embed(self.font_revision).map_err(write())?;
        s.embed(0_u32).map_err(write())?;
        s.embed(MAGIC_NUMBER).map_err(write())?;
        s.embed(self.flags).map_err(write())?;
        s.embed(self.units_per_em).map_err(write())?;
        s.embed(self.created).map_err(write())?;
        s.embed(self.modified).map_err(write())?;
        s.embed(self.x_min).map_err(write())?;
        s.embed(self.y_min).map_err(write())?;
        s.embed(self.x_max).map_err(write())?;
        s.embed(self.y_max).map_err(write())?;
        s.embed(self.mac_style).map_err(write())?;
        s.embed(self.lowest_rec_ppem).map_err(write())?;
        s.embed(FONT_DIRECTION_HINT).map_err(write())?;
        s.embed(self.index_to_loc_format).map_err(write())?;
        s.embed(0_i16).map_err(write())?;
        Ok(())
    }
}

/// Byte offset of `checkSumAdjustment` within the table.
pub(crate) const CHECKSUM_ADJUSTMENT_OFFSET: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Severity, font_data::ReadError};

    fn sanitize(data: &[u8]) -> Result<Head, TableError> {
        Head::sanitize(FontData::new(data), &Font::new())
    }

    #[test]
    fn smoke_test() {
        let head = sanitize(&font_test_data::head(0x001F)).unwrap();
        assert_eq!(head.flags(), 0x001F);
        assert!(head.has_flags(
            flags::INSTRUCTIONS_DEPEND_ON_SIZE | flags::INSTRUCTIONS_ALTER_ADVANCE
        ));
        assert_eq!(head.units_per_em(), 1024);
        assert_eq!(head.bounds(), (-100, -200, 900, 800));
        assert_eq!(head.font_revision(), Fixed::ONE);
    }

    #[test]
    fn undefined_flags_are_cleared() {
        let head = sanitize(&font_test_data::head(0xFFFF)).unwrap();
        assert_eq!(head.flags(), DEFINED_FLAGS);
    }

    #[test]
    fn round_trip_normalizes() {
        let mut buf = font_test_data::head(0x0014);
        buf.set("checksum_adjustment", 0xDEADBEEF_u32);
        buf.set("font_direction_hint", -1_i16);
        let head = sanitize(&buf).unwrap();
        let mut s = Serializer::new(1024);
        head.serialize(&Font::new(), &mut s).unwrap();
        let out = s.copy_bytes().unwrap();
        assert_eq!(out.len(), 54);
        assert_eq!(&out[8..12], &[0, 0, 0, 0]);
        assert_eq!(&out[48..50], &[0, 2]);
        assert_eq!(sanitize(&out).unwrap(), head);
    }

    #[test]
    fn bad_magic() {
        let mut buf = font_test_data::head(0x0014);
        buf.set("magic_number", 0x12345678_u32);
        let err = sanitize(&buf).unwrap_err();
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn bad_units_per_em() {
        for upem in [0_u16, 15, 16385] {
            let mut buf = font_test_data::head(0x0014);
            buf.set("units_per_em", upem);
            assert!(matches!(sanitize(&buf), Err(TableError::Malformed(_))));
        }
    }

    #[test]
    fn bad_loca_format() {
        let mut buf = font_test_data::head(0x0014);
        buf.set("index_to_loc_format", 2_i16);
        assert!(matches!(sanitize(&buf), Err(TableError::Malformed(_))));
    }

    #[test]
    fn truncated() {
        let buf = font_test_data::head(0x0014);
        let err = Head::sanitize(FontData::new(&buf[..53]), &Font::new()).unwrap_err();
        assert_eq!(
            err,
            TableError::ShortRead {
                context: "head table".into(),
                source: ReadError::OutOfBounds
            }
        );
    }
}
