//! Table bytes with named fields, for corrupting fixtures in place.

use std::collections::BTreeMap;
use std::ops::Range;

use font_types::Scalar;

/// The bytes of a table under construction.
///
/// Fields added with [`TableData::field`] keep their byte range, so a test
/// can later overwrite exactly that field with [`TableData::set`].
#[derive(Debug, Clone, Default)]
pub struct TableData {
    bytes: Vec<u8>,
    fields: BTreeMap<String, Range<usize>>,
}

impl TableData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unnamed big-endian value.
    pub fn scalar(mut self, value: impl Scalar) -> Self {
        self.bytes.extend_from_slice(value.to_raw().as_ref());
        self
    }

    /// Append several unnamed values of the same type.
    pub fn scalars<T: Scalar>(self, values: impl IntoIterator<Item = T>) -> Self {
        values
            .into_iter()
            .fold(self, |table, value| table.scalar(value))
    }

    /// Append a value that can be patched later under `name`.
    pub fn field(mut self, name: impl Into<String>, value: impl Scalar) -> Self {
        let start = self.bytes.len();
        self = self.scalar(value);
        self.fields.insert(name.into(), start..self.bytes.len());
        self
    }

    /// Append raw bytes.
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// The byte range of a named field.
    ///
    /// Panics if there is no such field.
    pub fn range_of(&self, name: &str) -> Range<usize> {
        match self.fields.get(name) {
            Some(range) => range.clone(),
            None => panic!("no field named '{name}'"),
        }
    }

    /// Overwrite a named field.
    ///
    /// The new value must have the same width as the one it replaces.
    pub fn set(&mut self, name: &str, value: impl Scalar) {
        let range = self.range_of(name);
        let raw = value.to_raw();
        let raw = raw.as_ref();
        assert_eq!(range.len(), raw.len(), "field '{name}' changed width");
        self.bytes[range].copy_from_slice(raw);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::ops::Deref for TableData {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}
