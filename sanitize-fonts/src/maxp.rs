//! The [maxp](https://docs.microsoft.com/en-us/typography/opentype/spec/maxp) table

use font_types::Tag;

use crate::{
    error::TableError, font::Font, font_data::FontData, serialize::Serializer, table::Sanitize,
};

/// Version 0.5, used by fonts with CFF outlines.
pub const VERSION_0_5: u32 = 0x0000_5000;
/// Version 1.0, used by fonts with TrueType outlines.
pub const VERSION_1_0: u32 = 0x0001_0000;

/// A validated `maxp` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Maxp {
    num_glyphs: u16,
    v1: Option<MaxpV1>,
}

/// The fields only present in version 1.0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaxpV1 {
    pub max_points: u16,
    pub max_contours: u16,
    pub max_composite_points: u16,
    pub max_composite_contours: u16,
    pub max_zones: u16,
    pub max_twilight_points: u16,
    pub max_storage: u16,
    pub max_function_defs: u16,
    pub max_instruction_defs: u16,
    pub max_stack_elements: u16,
    pub max_size_of_instructions: u16,
    pub max_component_elements: u16,
    pub max_component_depth: u16,
}

impl Maxp {
    /// The number of glyphs in the font.
    pub fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    pub fn version(&self) -> u32 {
        if self.v1.is_some() {
            VERSION_1_0
        } else {
            VERSION_0_5
        }
    }

    pub fn v1(&self) -> Option<&MaxpV1> {
        self.v1.as_ref()
    }
}

impl Sanitize for Maxp {
    const TAG: Tag = Tag::new(b"maxp");

    fn sanitize(data: FontData, _font: &Font) -> Result<Self, TableError> {
        let mut cursor = data.cursor();
        let short_read = || TableError::short_read("maxp table");

        let version: u32 = cursor.read().map_err(short_read())?;
        if version != VERSION_0_5 && version != VERSION_1_0 {
            return Err(TableError::Malformed(format!(
                "Bad maxp version: 0x{version:08X}"
            )));
        }
        let num_glyphs: u16 = cursor.read().map_err(short_read())?;
        if num_glyphs == 0 {
            return Err(TableError::Malformed("numGlyphs is 0".into()));
        }
        if version == VERSION_0_5 {
            return Ok(Maxp {
                num_glyphs,
                v1: None,
            });
        }

        let mut v1 = MaxpV1 {
            max_points: cursor.read().map_err(short_read())?,
            max_contours: cursor.read().map_err(short_read())?,
            max_composite_points: cursor.read().map_err(short_read())?,
            max_composite_contours: cursor.read().map_err(short_read())?,
            max_zones: cursor.read().map_err(short_read())?,
            max_twilight_points: cursor.read().map_err(short_read())?,
            max_storage: cursor.read().map_err(short_read())?,
            max_function_defs: cursor.read().map_err(short_read())?,
            max_instruction_defs: cursor.read().map_err(short_read())?,
            max_stack_elements: cursor.read().map_err(short_read())?,
            max_size_of_instructions: cursor.read().map_err(short_read())?,
            max_component_elements: cursor.read().map_err(short_read())?,
            max_component_depth: cursor.read().map_err(short_read())?,
        };
        // maxZones is 1 without twilight zone, 2 with it
        if v1.max_zones == 0 {
            log::info!("maxp: bad maxZones 0, using 1");
            v1.max_zones = 1;
        } else if v1.max_zones > 2 {
            log::info!("maxp: bad maxZones {}, using 2", v1.max_zones);
            v1.max_zones = 2;
        }

        Ok(Maxp {
            num_glyphs,
            v1: Some(v1),
        })
    }

    fn serialize(&self, _font: &Font, s: &mut Serializer) -> Result<(), TableError> {
        let write = || TableError::write("maxp table");
        s.embed(self.version()).map_err(write())?;
        s.embed(self.num_glyphs).map_err(write())?;
        let Some(v1) = self.v1 else {
            return Ok(());
        };
        for value in [
            v1.max_points,
            v1.max_contours,
            v1.max_composite_points,
            v1.max_composite_contours,
            v1.max_zones,
            v1.max_twilight_points,
            v1.max_storage,
            v1.max_function_defs,
            v1.max_instruction_defs,
            v1.max_stack_elements,
            v1.max_size_of_instructions,
            v1.max_component_elements,
            v1.max_component_depth,
        ] {
            s.embed(value).map_err(write())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;

    fn sanitize(data: &[u8]) -> Result<Maxp, TableError> {
        Maxp::sanitize(FontData::new(data), &Font::new())
    }

    fn serialize(maxp: &Maxp) -> Vec<u8> {
        let mut s = Serializer::new(64);
        maxp.serialize(&Font::new(), &mut s).unwrap();
        s.copy_bytes().unwrap()
    }

    #[test]
    fn version_0_5() {
        let buf = font_test_data::maxp_cff(7);
        let maxp = sanitize(&buf).unwrap();
        assert_eq!(maxp.num_glyphs(), 7);
        assert_eq!(maxp.version(), VERSION_0_5);
        assert!(maxp.v1().is_none());
        assert_eq!(serialize(&maxp), buf.as_slice());
    }

    #[test]
    fn version_1_0() {
        let buf = font_test_data::maxp(3);
        let maxp = sanitize(&buf).unwrap();
        assert_eq!(maxp.num_glyphs(), 3);
        assert_eq!(maxp.v1().unwrap().max_zones, 2);
        assert_eq!(serialize(&maxp), buf.as_slice());
    }

    #[test]
    fn max_zones_is_clamped() {
        for (zones, expected) in [(0_u16, 1_u16), (1, 1), (2, 2), (3, 2), (u16::MAX, 2)] {
            let mut buf = font_test_data::maxp(3);
            buf.set("max_zones", zones);
            let maxp = sanitize(&buf).unwrap();
            assert_eq!(maxp.v1().unwrap().max_zones, expected);
        }
    }

    #[test]
    fn no_glyphs() {
        let buf = font_test_data::maxp(0);
        assert_eq!(sanitize(&buf).unwrap_err().severity(), Severity::Error);
    }

    #[test]
    fn bad_version() {
        let mut buf = font_test_data::maxp(3);
        buf.set("version", 0x0002_0000_u32);
        assert!(matches!(sanitize(&buf), Err(TableError::Malformed(_))));
    }

    #[test]
    fn truncated_v1() {
        let buf = font_test_data::maxp(3);
        assert!(matches!(
            sanitize(&buf[..30]),
            Err(TableError::ShortRead { .. })
        ));
    }
}
