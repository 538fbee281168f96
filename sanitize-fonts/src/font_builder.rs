//!  Assembling sanitized tables into font files

use std::collections::BTreeMap;

use font_types::Tag;

use crate::{font_file::TableDirectory, head::CHECKSUM_ADJUSTMENT_OFFSET, HEAD};

const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

/// Build a font from some set of tables.
///
/// Tables are written in ascending tag order, each padded to four bytes.
#[derive(Debug, Clone, Default)]
pub struct FontBuilder {
    sfnt_version: u32,
    tables: BTreeMap<Tag, Vec<u8>>,
}

/// The binary search fields of a table directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SearchRange {
    pub search_range: u16,
    pub entry_selector: u16,
    pub range_shift: u16,
}

impl SearchRange {
    /// See <https://learn.microsoft.com/en-us/typography/opentype/spec/otff#table-directory>
    pub fn compute(n_items: usize, item_size: usize) -> Self {
        let entry_selector = (n_items.max(1) as f64).log2().floor() as usize;
        let search_range = (2.0_f64.powi(entry_selector as i32) * item_size as f64) as usize;
        // The result doesn't really make sense with 0 tables but ... let's at least not fail
        let range_shift = (n_items * item_size).saturating_sub(search_range);
        SearchRange {
            search_range: search_range.try_into().unwrap_or(u16::MAX),
            entry_selector: entry_selector.try_into().unwrap_or(u16::MAX),
            range_shift: range_shift.try_into().unwrap_or(u16::MAX),
        }
    }
}

impl FontBuilder {
    /// Create a new builder for a font with the given sfnt version.
    pub fn new(sfnt_version: u32) -> Self {
        FontBuilder {
            sfnt_version,
            tables: BTreeMap::new(),
        }
    }

    /// A builder method to add raw data for the provided tag
    pub fn add_raw(&mut self, tag: Tag, data: impl Into<Vec<u8>>) -> &mut Self {
        self.tables.insert(tag, data.into());
        self
    }

    /// Returns `true` if the builder contains a table with this tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.tables.contains_key(&tag)
    }

    /// Assemble all the tables into a binary font file with a [Table Directory].
    ///
    /// The `checkSumAdjustment` field of `head`, if present, is set so that
    /// the whole file sums to the magic value.
    ///
    /// [Table Directory]: https://learn.microsoft.com/en-us/typography/opentype/spec/otff#table-directory
    pub fn build(&self) -> Vec<u8> {
        let header_len = TableDirectory::len_for(self.tables.len());
        let mut position = header_len as u32;
        let records: Vec<_> = self
            .tables
            .iter()
            .map(|(tag, data)| {
                let offset = position;
                position += round4(data.len()) as u32;
                DirectoryEntry {
                    tag: *tag,
                    checksum: compute_checksum(data),
                    offset,
                    length: data.len() as u32,
                }
            })
            .collect();

        let mut data = Vec::with_capacity(position as usize);
        write_directory(&mut data, self.sfnt_version, &records);
        for table in self.tables.values() {
            write_padded(&mut data, table);
        }

        if let Some(record) = records.iter().find(|record| record.tag == HEAD) {
            let whole_font = compute_checksum(&data);
            let adjustment = CHECKSUM_MAGIC.wrapping_sub(whole_font);
            let pos = record.offset as usize + CHECKSUM_ADJUSTMENT_OFFSET;
            if let Some(field) = data.get_mut(pos..pos + 4) {
                field.copy_from_slice(&adjustment.to_be_bytes());
            }
        }
        data
    }
}

/// Build a font collection.
///
/// Each font is a list of tables; tables that are the same shared instance
/// (as identified by the caller-provided key) are written once.
#[derive(Debug, Clone, Default)]
pub struct CollectionBuilder {
    fonts: Vec<CollectionFont>,
    blobs: Vec<Vec<u8>>,
    blob_keys: BTreeMap<usize, usize>,
}

#[derive(Debug, Clone)]
struct CollectionFont {
    sfnt_version: u32,
    // tag -> index into blobs
    tables: BTreeMap<Tag, usize>,
}

impl CollectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new font in the collection.
    pub fn add_font(&mut self, sfnt_version: u32) -> &mut Self {
        self.fonts.push(CollectionFont {
            sfnt_version,
            tables: BTreeMap::new(),
        });
        self
    }

    /// Add a table to the most recently added font.
    ///
    /// `key` identifies the table instance: a table with a key that has
    /// already been seen shares the earlier bytes and `data` is not called.
    pub fn add_shared<E>(
        &mut self,
        tag: Tag,
        key: usize,
        data: impl FnOnce() -> Result<Vec<u8>, E>,
    ) -> Result<&mut Self, E> {
        let index = match self.blob_keys.get(&key) {
            Some(index) => *index,
            None => {
                self.blobs.push(data()?);
                let index = self.blobs.len() - 1;
                self.blob_keys.insert(key, index);
                index
            }
        };
        if let Some(font) = self.fonts.last_mut() {
            font.tables.insert(tag, index);
        }
        Ok(self)
    }

    pub fn num_fonts(&self) -> usize {
        self.fonts.len()
    }

    /// Assemble a 'ttcf' file.
    ///
    /// `checkSumAdjustment` is left at zero, since a shared `head` cannot
    /// match the checksum of more than one font.
    pub fn build(&self) -> Vec<u8> {
        let ttc_header_len = 12 + 4 * self.fonts.len();
        let directories_len: usize = self
            .fonts
            .iter()
            .map(|font| TableDirectory::len_for(font.tables.len()))
            .sum();

        let mut position = (ttc_header_len + directories_len) as u32;
        let blob_offsets: Vec<u32> = self
            .blobs
            .iter()
            .map(|blob| {
                let offset = position;
                position += round4(blob.len()) as u32;
                offset
            })
            .collect();

        let mut data = Vec::with_capacity(position as usize);
        data.extend_from_slice(&crate::font_file::TTC_HEADER_TAG.to_be_bytes());
        data.extend_from_slice(&0x0001_0000_u32.to_be_bytes());
        data.extend_from_slice(&(self.fonts.len() as u32).to_be_bytes());
        let mut directory_offset = ttc_header_len;
        for font in &self.fonts {
            data.extend_from_slice(&(directory_offset as u32).to_be_bytes());
            directory_offset += TableDirectory::len_for(font.tables.len());
        }
        for font in &self.fonts {
            let records: Vec<_> = font
                .tables
                .iter()
                .map(|(tag, index)| DirectoryEntry {
                    tag: *tag,
                    checksum: compute_checksum(&self.blobs[*index]),
                    offset: blob_offsets[*index],
                    length: self.blobs[*index].len() as u32,
                })
                .collect();
            write_directory(&mut data, font.sfnt_version, &records);
        }
        for blob in &self.blobs {
            write_padded(&mut data, blob);
        }
        data
    }
}

struct DirectoryEntry {
    tag: Tag,
    checksum: u32,
    offset: u32,
    length: u32,
}

fn write_directory(data: &mut Vec<u8>, sfnt_version: u32, records: &[DirectoryEntry]) {
    let computed = SearchRange::compute(records.len(), 16);
    data.extend_from_slice(&sfnt_version.to_be_bytes());
    data.extend_from_slice(&(records.len() as u16).to_be_bytes());
    data.extend_from_slice(&computed.search_range.to_be_bytes());
    data.extend_from_slice(&computed.entry_selector.to_be_bytes());
    data.extend_from_slice(&computed.range_shift.to_be_bytes());
    for record in records {
        data.extend_from_slice(&record.tag.to_be_bytes());
        data.extend_from_slice(&record.checksum.to_be_bytes());
        data.extend_from_slice(&record.offset.to_be_bytes());
        data.extend_from_slice(&record.length.to_be_bytes());
    }
}

fn write_padded(data: &mut Vec<u8>, table: &[u8]) {
    data.extend_from_slice(table);
    let rem = round4(table.len()) - table.len();
    let padding = [0u8; 4];
    data.extend_from_slice(&padding[..rem]);
}

/// <https://github.com/google/woff2/blob/a0d0ed7da27b708c0a4e96ad7a998bddc933c06e/src/round.h#L19>
fn round4(sz: usize) -> usize {
    (sz + 3) & !3
}

/// The checksum of a table: the sum of its big-endian u32 words, with the
/// last word zero padded.
pub fn compute_checksum(table: &[u8]) -> u32 {
    let mut chunks = table.chunks_exact(4);
    let mut sum = chunks.by_ref().fold(0_u32, |sum, chunk| {
        sum.wrapping_add(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    });
    let rem = chunks.remainder();
    if !rem.is_empty() {
        let mut last = [0u8; 4];
        last[..rem.len()].copy_from_slice(rem);
        sum = sum.wrapping_add(u32::from_be_bytes(last));
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{font_data::FontData, font_file::FileRef};
    use pretty_assertions::assert_eq;

    #[test]
    fn sets_binary_search_assists() {
        // Based on Roboto's num tables
        let data = b"doesn't matter".to_vec();
        let mut builder = FontBuilder::new(0x0001_0000);
        (0..0x16u32).for_each(|i| {
            builder.add_raw(Tag::from_be_bytes(i.to_be_bytes()), data.clone());
        });
        let bytes = builder.build();
        let data = FontData::new(&bytes);
        assert_eq!(
            (256, 4, 96),
            (
                data.read_at::<u16>(6).unwrap(),
                data.read_at::<u16>(8).unwrap(),
                data.read_at::<u16>(10).unwrap()
            )
        );
    }

    #[test]
    fn survives_no_tables() {
        let bytes = FontBuilder::new(0x0001_0000).build();
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn pad4() {
        for i in 0..10 {
            let pad = round4(i) - i;
            assert!(pad < 4);
            assert!((i + pad) % 4 == 0, "pad {i} +{pad} bytes");
        }
    }

    #[test]
    fn checksum() {
        assert_eq!(compute_checksum(&[]), 0);
        assert_eq!(compute_checksum(&[0, 0, 0, 1, 0, 0, 0, 2]), 3);
        assert_eq!(compute_checksum(&[1, 2]), 0x0102_0000);
        assert_eq!(compute_checksum(&[0xFF; 8]), 0xFFFF_FFFE);
    }

    #[test]
    fn tables_are_sorted_and_checksummed() {
        let mut builder = FontBuilder::new(0x0001_0000);
        builder
            .add_raw(Tag::new(b"maxp"), vec![0, 0, 0x50, 0, 0, 1])
            .add_raw(Tag::new(b"hdmx"), vec![1, 2, 3]);
        assert!(builder.contains(Tag::new(b"hdmx")));
        let bytes = builder.build();
        let fonts = FileRef::new(&bytes).unwrap().fonts().unwrap();
        let records = fonts[0].table_directory().table_records();
        assert_eq!(records[0].tag, Tag::new(b"hdmx"));
        assert_eq!(records[1].tag, Tag::new(b"maxp"));
        assert_eq!(records[0].offset, 44);
        assert_eq!(records[1].offset, 48);
        assert_eq!(records[0].checksum, 0x0102_0300);
        assert_eq!(bytes.len(), 56);
    }

    #[test]
    fn head_checksum_adjustment() {
        let head = font_test_data::head(0x001F);
        let mut builder = FontBuilder::new(0x0001_0000);
        builder
            .add_raw(HEAD, head.as_slice())
            .add_raw(Tag::new(b"maxp"), font_test_data::maxp(3).as_slice());
        let bytes = builder.build();
        assert_eq!(compute_checksum(&bytes), CHECKSUM_MAGIC);
    }

    #[test]
    fn collection_writes_shared_tables_once() {
        let mut builder = CollectionBuilder::new();
        let mut calls = 0;
        builder
            .add_font(0x0001_0000)
            .add_shared(HEAD, 1, || {
                calls += 1;
                Ok::<_, ()>(vec![1; 8])
            })
            .unwrap()
            .add_shared(Tag::new(b"maxp"), 2, || Ok::<_, ()>(vec![2; 6]))
            .unwrap();
        builder
            .add_font(0x0001_0000)
            .add_shared(HEAD, 1, || {
                calls += 1;
                Ok::<_, ()>(vec![1; 8])
            })
            .unwrap();
        // a failed table is not recorded
        assert!(builder
            .add_shared(Tag::new(b"hdmx"), 3, || Err("too big"))
            .is_err());
        assert_eq!(calls, 1);
        assert_eq!(builder.num_fonts(), 2);

        let bytes = builder.build();
        let header_len = 12 + 8;
        let directories_len = (12 + 32) + (12 + 16);
        assert_eq!(bytes.len(), header_len + directories_len + 8 + 8);

        let fonts = FileRef::new(&bytes).unwrap().fonts().unwrap();
        let first = fonts[0].data_for_tag(HEAD).unwrap();
        let second = fonts[1].data_for_tag(HEAD).unwrap();
        assert_eq!(first.as_bytes(), &[1; 8]);
        assert_eq!(first.as_bytes().as_ptr(), second.as_bytes().as_ptr());
    }
}
