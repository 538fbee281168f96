//! The [Horizontal Device Metrics](https://learn.microsoft.com/en-us/typography/opentype/spec/hdmx) table.

use font_types::Tag;

use crate::{
    error::TableError,
    font::Font,
    font_data::FontData,
    head::{flags, Head},
    maxp::Maxp,
    serialize::Serializer,
    table::Sanitize,
};

/// Both bits must be set in `head.flags` for an hdmx table to be meaningful.
///
/// See <https://learn.microsoft.com/en-us/typography/opentype/spec/recom#hdmx-table>
pub const REQUIRED_HEAD_FLAGS: u16 =
    flags::INSTRUCTIONS_DEPEND_ON_SIZE | flags::INSTRUCTIONS_ALTER_ADVANCE;

const MAX_PAD_LEN: i32 = 3;

/// A validated hdmx table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hdmx {
    version: u16,
    size_device_record: i32,
    // never stored in the font; derived from size_device_record and numGlyphs
    pad_len: u8,
    records: Vec<DeviceRecord>,
}

/// Advance widths for every glyph at one pixel size.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceRecord {
    /// Pixel size for following widths (as ppem).
    pub pixel_size: u8,
    /// Maximum width.
    pub max_width: u8,
    /// Array of widths, indexed by glyph id.
    pub widths: Vec<u8>,
}

impl Hdmx {
    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn num_records(&self) -> usize {
        self.records.len()
    }

    /// Size of a device record, including padding.
    pub fn size_device_record(&self) -> i32 {
        self.size_device_record
    }

    /// The number of zero bytes following each record's widths.
    pub fn pad_len(&self) -> u8 {
        self.pad_len
    }

    /// The device records, sorted by pixel size.
    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    /// Returns the device record that exactly matches the given
    /// size (as ppem).
    pub fn record_for_size(&self, size: u8) -> Option<&DeviceRecord> {
        self.records
            .binary_search_by_key(&size, |record| record.pixel_size)
            .ok()
            .map(|idx| &self.records[idx])
    }
}

impl Sanitize for Hdmx {
    const TAG: Tag = Tag::new(b"hdmx");

    fn sanitize(data: FontData, font: &Font) -> Result<Self, TableError> {
        let missing = |required| TableError::MissingPrerequisite {
            table: Self::TAG,
            required,
        };
        let head = font.head().ok_or_else(|| missing(Head::TAG))?;
        let maxp = font.maxp().ok_or_else(|| missing(Maxp::TAG))?;

        if !head.has_flags(REQUIRED_HEAD_FLAGS) {
            return Err(TableError::Recoverable(format!(
                "head flags 0x{:04X} do not have bits 2 and 4 set",
                head.flags()
            )));
        }

        let mut cursor = data.cursor();
        let header = || TableError::short_read("hdmx header");
        let version: u16 = cursor.read().map_err(header())?;
        let num_recs: i16 = cursor.read().map_err(header())?;
        let size_device_record: i32 = cursor.read().map_err(header())?;

        if version != 0 {
            return Err(TableError::Recoverable(format!("bad version: {version}")));
        }
        if num_recs <= 0 {
            return Err(TableError::Recoverable(format!("bad num_recs: {num_recs}")));
        }

        let num_glyphs = maxp.num_glyphs();
        let actual_size_device_record = i32::from(num_glyphs) + 2;
        if size_device_record < actual_size_device_record {
            return Err(TableError::Recoverable(format!(
                "bad size_device_record: {size_device_record}"
            )));
        }
        let pad_len = size_device_record - actual_size_device_record;
        if pad_len > MAX_PAD_LEN {
            return Err(TableError::Malformed(format!("Bad padding {pad_len}")));
        }
        let pad_len = pad_len as u8;

        let mut records = Vec::with_capacity(num_recs as usize);
        let mut last_pixel_size = 0;
        for i in 0..num_recs {
            let record = || TableError::short_read(format!("hdmx record {i}"));
            let pixel_size: u8 = cursor.read().map_err(record())?;
            let max_width: u8 = cursor.read().map_err(record())?;
            if i != 0 && pixel_size <= last_pixel_size {
                return Err(TableError::Recoverable("records are not sorted".into()));
            }
            last_pixel_size = pixel_size;

            let widths = cursor
                .read_array(num_glyphs as usize)
                .map_err(TableError::short_read(format!(
                    "glyph widths in hdmx record {i}"
                )))?;
            cursor
                .skip(pad_len as usize)
                .map_err(TableError::short_read(format!(
                    "padding of length {pad_len} in hdmx record {i}"
                )))?;

            records.push(DeviceRecord {
                pixel_size,
                max_width,
                widths: widths.to_owned(),
            });
        }

        Ok(Hdmx {
            version,
            size_device_record,
            pad_len,
            records,
        })
    }

    fn should_serialize(&self, font: &Font) -> bool {
        // this table is not for CFF fonts
        font.is_outline_font()
    }

    fn serialize(&self, _font: &Font, s: &mut Serializer) -> Result<(), TableError> {
        let num_recs = i16::try_from(self.records.len()).map_err(|_| {
            TableError::OutputConstraint(format!(
                "too many hdmx records to write: {}",
                self.records.len()
            ))
        })?;
        let header = || TableError::write("hdmx header");
        s.embed(self.version).map_err(header())?;
        s.embed(num_recs).map_err(header())?;
        s.embed(self.size_device_record).map_err(header())?;

        for (i, record) in self.records.iter().enumerate() {
            let write = || TableError::write(format!("hdmx record {i}"));
            s.embed(record.pixel_size).map_err(write())?;
            s.embed(record.max_width).map_err(write())?;
            s.embed_bytes(&record.widths).map_err(write())?;
            s.embed_zeros(self.pad_len as usize)
                .map_err(TableError::write(format!(
                    "hdmx padding of length {}",
                    self.pad_len
                )))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Severity,
        font_data::ReadError,
        table::{Passthrough, SanitizedTable},
        GLYF,
    };
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rstest::rstest;

    const OUTLINE_FLAGS: u16 = 0x001F;
    const UNSORTED: &str = "records are not sorted";

    fn make_font(head_flags: u16, num_glyphs: u16) -> Font {
        let mut font = Font::new();
        let head_data = font_test_data::head(head_flags);
        let head = Head::sanitize(FontData::new(&head_data), &font).unwrap();
        font.insert(SanitizedTable::Head(head));
        let maxp_data = font_test_data::maxp(num_glyphs);
        let maxp = Maxp::sanitize(FontData::new(&maxp_data), &font).unwrap();
        font.insert(SanitizedTable::Maxp(maxp));
        font.insert(SanitizedTable::Passthrough(Passthrough::new(
            GLYF,
            FontData::new(&[0; 4]),
        )));
        font
    }

    fn sanitize(data: &[u8], font: &Font) -> Result<Hdmx, TableError> {
        Hdmx::sanitize(FontData::new(data), font)
    }

    fn serialize(hdmx: &Hdmx, font: &Font) -> Vec<u8> {
        let mut s = Serializer::new(1 << 16);
        hdmx.serialize(font, &mut s).unwrap();
        s.copy_bytes().unwrap()
    }

    fn record(pixel_size: u8, max_width: u8, widths: &[u8]) -> DeviceRecord {
        DeviceRecord {
            pixel_size,
            max_width,
            widths: widths.to_vec(),
        }
    }

    #[test]
    fn single_record_without_padding() {
        let font = make_font(OUTLINE_FLAGS, 3);
        let buf = font_test_data::hdmx(5, &[(12, 10, &[9, 9, 8])]);
        let hdmx = sanitize(&buf, &font).unwrap();
        assert_eq!(hdmx.version(), 0);
        assert_eq!(hdmx.num_records(), 1);
        assert_eq!(hdmx.pad_len(), 0);
        assert_eq!(hdmx.records(), [record(12, 10, &[9, 9, 8])]);

        assert!(hdmx.should_serialize(&font));
        assert_eq!(serialize(&hdmx, &font), buf.as_slice());
    }

    #[test]
    fn padding_is_rebuilt() {
        let font = make_font(OUTLINE_FLAGS, 3);
        let mut buf = font_test_data::hdmx(8, &[(12, 10, &[9, 9, 8]), (16, 14, &[12, 13, 14])]);
        // garbage in the padding is not carried over
        buf.set("padding_0", 0xAB_u8);
        let hdmx = sanitize(&buf, &font).unwrap();
        assert_eq!(hdmx.pad_len(), 3);
        assert_eq!(
            serialize(&hdmx, &font),
            [
                0, 0, 0, 2, 0, 0, 0, 8, // header
                12, 10, 9, 9, 8, 0, 0, 0, // record 0
                16, 14, 12, 13, 14, 0, 0, 0, // record 1
            ]
        );
    }

    #[test]
    fn unsorted_records_are_dropped() {
        let font = make_font(OUTLINE_FLAGS, 3);
        let buf = font_test_data::hdmx(5, &[(12, 10, &[9, 9, 8]), (10, 8, &[7, 7, 6])]);
        let err = sanitize(&buf, &font).unwrap_err();
        assert_eq!(err, TableError::Recoverable(UNSORTED.into()));
        assert_eq!(err.severity(), Severity::Drop);
    }

    #[test]
    fn duplicate_pixel_sizes_are_dropped() {
        let font = make_font(OUTLINE_FLAGS, 1);
        let buf = font_test_data::hdmx(3, &[(12, 10, &[9]), (12, 10, &[9])]);
        assert!(sanitize(&buf, &font).unwrap_err().is_drop());
    }

    #[test]
    fn first_record_can_have_any_size() {
        let font = make_font(OUTLINE_FLAGS, 1);
        let buf = font_test_data::hdmx(3, &[(0, 0, &[0]), (1, 1, &[1])]);
        assert_eq!(sanitize(&buf, &font).unwrap().num_records(), 2);
    }

    #[rstest]
    #[case::no_bits(0x0000)]
    #[case::missing_bit_2(0x0010)]
    #[case::missing_bit_4(0x0004)]
    #[case::other_bits(0x000B)]
    fn dropped_without_head_flags(#[case] head_flags: u16) {
        let font = make_font(head_flags, 3);
        let buf = font_test_data::hdmx(5, &[(12, 10, &[9, 9, 8])]);
        assert!(sanitize(&buf, &font).unwrap_err().is_drop());
    }

    #[test]
    fn flags_checked_before_header() {
        // an empty table would be a short read, if the header were looked at
        let font = make_font(0x0010, 3);
        let err = Hdmx::sanitize(FontData::new(&[]), &font).unwrap_err();
        assert!(err.is_drop());
    }

    #[rstest]
    #[case::bad_version("version", 1)]
    #[case::zero_records("num_records", 0)]
    #[case::negative_records("num_records", -1)]
    #[case::min_records("num_records", i16::MIN as i32)]
    #[case::undersized_record("size_device_record", 4)]
    #[case::negative_record_size("size_device_record", -5)]
    fn recoverable_header_problems(#[case] field: &str, #[case] value: i32) {
        let font = make_font(OUTLINE_FLAGS, 3);
        let mut buf = font_test_data::hdmx(5, &[(12, 10, &[9, 9, 8])]);
        match field {
            "version" => buf.set(field, value as u16),
            "num_records" => buf.set(field, value as i16),
            _ => buf.set(field, value),
        }
        let err = sanitize(&buf, &font).unwrap_err();
        assert_eq!(err.severity(), Severity::Drop, "{err}");
    }

    #[rstest]
    #[case(9)]
    #[case(12)]
    #[case(i32::MAX)]
    fn oversized_padding_is_an_error(#[case] size_device_record: i32) {
        let font = make_font(OUTLINE_FLAGS, 3);
        let mut buf = font_test_data::hdmx(5, &[(12, 10, &[9, 9, 8])]);
        buf.set("size_device_record", size_device_record);
        let err = sanitize(&buf, &font).unwrap_err();
        assert!(matches!(err, TableError::Malformed(_)));
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn missing_prerequisites() {
        let buf = font_test_data::hdmx(5, &[(12, 10, &[9, 9, 8])]);
        let mut font = Font::new();
        assert_eq!(
            sanitize(&buf, &font),
            Err(TableError::MissingPrerequisite {
                table: Hdmx::TAG,
                required: Head::TAG
            })
        );
        let head_data = font_test_data::head(OUTLINE_FLAGS);
        let head = Head::sanitize(FontData::new(&head_data), &font).unwrap();
        font.insert(SanitizedTable::Head(head));
        let err = sanitize(&buf, &font).unwrap_err();
        assert_eq!(
            err,
            TableError::MissingPrerequisite {
                table: Hdmx::TAG,
                required: Maxp::TAG
            }
        );
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn truncated_last_width() {
        let font = make_font(OUTLINE_FLAGS, 3);
        let buf = font_test_data::hdmx(5, &[(12, 10, &[9, 9, 8]), (16, 14, &[12, 13, 14])]);
        let err = Hdmx::sanitize(FontData::new(&buf[..buf.len() - 1]), &font).unwrap_err();
        assert_eq!(
            err,
            TableError::ShortRead {
                context: "glyph widths in hdmx record 1".into(),
                source: ReadError::OutOfBounds,
            }
        );
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn truncated_padding() {
        let font = make_font(OUTLINE_FLAGS, 3);
        let buf = font_test_data::hdmx(6, &[(12, 10, &[9, 9, 8])]);
        let err = Hdmx::sanitize(FontData::new(&buf[..buf.len() - 1]), &font).unwrap_err();
        assert!(matches!(err, TableError::ShortRead { .. }));
    }

    #[test]
    fn truncated_header() {
        let font = make_font(OUTLINE_FLAGS, 3);
        let buf = font_test_data::hdmx(5, &[(12, 10, &[9, 9, 8])]);
        let err = Hdmx::sanitize(FontData::new(&buf[..7]), &font).unwrap_err();
        assert_eq!(
            err,
            TableError::ShortRead {
                context: "hdmx header".into(),
                source: ReadError::OutOfBounds,
            }
        );
    }

    #[test]
    fn not_serialized_without_glyf() {
        let mut font = make_font(OUTLINE_FLAGS, 3);
        let buf = font_test_data::hdmx(5, &[(12, 10, &[9, 9, 8])]);
        let hdmx = sanitize(&buf, &font).unwrap();
        font.free_table(GLYF);
        assert!(!hdmx.should_serialize(&font));
    }

    #[test]
    fn too_many_records_to_serialize() {
        let font = make_font(OUTLINE_FLAGS, 1);
        let hdmx = Hdmx {
            version: 0,
            size_device_record: 3,
            pad_len: 0,
            records: (0..=i16::MAX as usize)
                .map(|i| record(i as u8, 0, &[0]))
                .collect(),
        };
        let mut s = Serializer::new(1 << 20);
        let err = hdmx.serialize(&font, &mut s).unwrap_err();
        assert!(matches!(err, TableError::OutputConstraint(_)));
        assert!(s.is_empty());
    }

    #[test]
    fn write_failure() {
        let font = make_font(OUTLINE_FLAGS, 3);
        let buf = font_test_data::hdmx(8, &[(12, 10, &[9, 9, 8])]);
        let hdmx = sanitize(&buf, &font).unwrap();
        // room for the header and part of the record
        let mut s = Serializer::new(12);
        let err = hdmx.serialize(&font, &mut s).unwrap_err();
        assert!(matches!(err, TableError::Write { .. }));
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn find_by_size() {
        let font = make_font(OUTLINE_FLAGS, 3);
        let buf = font_test_data::hdmx(
            8,
            &[(8, 13, &[10, 12, 13]), (16, 21, &[18, 20, 21]), (32, 52, &[38, 40, 52])],
        );
        let hdmx = sanitize(&buf, &font).unwrap();
        assert_eq!(hdmx.record_for_size(8).unwrap().pixel_size, 8);
        assert_eq!(hdmx.record_for_size(16).unwrap().max_width, 21);
        assert_eq!(hdmx.record_for_size(32).unwrap().widths, [38, 40, 52]);
        assert!(hdmx.record_for_size(7).is_none());
        assert!(hdmx.record_for_size(20).is_none());
    }

    // random record sequences: sorted ones survive a round trip, anything
    // else is dropped
    #[test]
    fn random_record_orderings() {
        let mut rng = StdRng::seed_from_u64(0x68646d78);
        for _ in 0..200 {
            let num_glyphs = rng.gen_range(1..=40_u16);
            let pad_len = rng.gen_range(0..=3_i32);
            let num_records = rng.gen_range(1..=12_usize);
            let mut sizes: Vec<u8> = (0..num_records).map(|_| rng.gen()).collect();
            if rng.gen_bool(0.5) {
                sizes.sort_unstable();
                sizes.dedup();
            }
            let strictly_increasing = sizes.windows(2).all(|pair| pair[0] < pair[1]);
            let widths: Vec<Vec<u8>> = sizes
                .iter()
                .map(|_| (0..num_glyphs).map(|_| rng.gen()).collect())
                .collect();
            let records: Vec<_> = sizes
                .iter()
                .zip(&widths)
                .map(|(size, widths)| (*size, rng.gen::<u8>(), widths.as_slice()))
                .collect();

            let font = make_font(OUTLINE_FLAGS, num_glyphs);
            let buf = font_test_data::hdmx(i32::from(num_glyphs) + 2 + pad_len, &records);
            match sanitize(&buf, &font) {
                Ok(hdmx) => {
                    assert!(strictly_increasing);
                    assert_eq!(i32::from(hdmx.pad_len()), pad_len);
                    assert!(hdmx
                        .records()
                        .windows(2)
                        .all(|pair| pair[0].pixel_size < pair[1].pixel_size));
                    assert!(hdmx
                        .records()
                        .iter()
                        .all(|rec| rec.widths.len() == num_glyphs as usize));
                    let out = serialize(&hdmx, &font);
                    let reparsed = sanitize(&out, &font).unwrap();
                    assert_eq!(reparsed.records(), hdmx.records());
                }
                Err(err) => {
                    assert!(!strictly_increasing);
                    assert_eq!(err, TableError::Recoverable(UNSORTED.into()));
                }
            }
        }
    }
}
