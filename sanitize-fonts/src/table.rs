//! The lifecycle shared by every sanitized table.

use font_types::Tag;

use crate::{
    error::TableError,
    font::Font,
    font_data::FontData,
    hdmx::Hdmx,
    head::Head,
    maxp::Maxp,
    serialize::Serializer,
};

/// A top-level table that can be validated and re-encoded.
///
/// A table is produced by a single call to [`Sanitize::sanitize`]. On
/// failure nothing is produced, so a caller can never observe a half-parsed
/// table. Sharing a table between fonts and releasing it are handled by
/// [`Font::reuse_table`] and [`Font::free_table`], which work the same way
/// for every table type.
pub trait Sanitize: Sized {
    /// The tag of this table in the font's table directory.
    const TAG: Tag;

    /// Parse and validate `data`.
    ///
    /// `font` holds the tables that have already been sanitized; it may be
    /// consulted for prerequisite values but is never modified.
    fn sanitize(data: FontData, font: &Font) -> Result<Self, TableError>;

    /// Whether this table should be written to the output font.
    ///
    /// Only successfully sanitized tables exist, so by default this is `true`.
    fn should_serialize(&self, _font: &Font) -> bool {
        true
    }

    /// Write the validated table.
    fn serialize(&self, font: &Font, s: &mut Serializer) -> Result<(), TableError>;
}

/// A table whose contents are copied without validation.
///
/// These are only created when unrecognized tables are explicitly allowed
/// through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Passthrough {
    tag: Tag,
    data: Vec<u8>,
}

impl Passthrough {
    pub fn new(tag: Tag, data: FontData) -> Self {
        Passthrough {
            tag,
            data: data.as_bytes().to_owned(),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn serialize(&self, s: &mut Serializer) -> Result<(), TableError> {
        s.embed_bytes(&self.data)
            .map(|_| ())
            .map_err(TableError::write(format!("'{}' table", self.tag)))
    }
}

/// Any table that can live in a [`Font`].
#[derive(Clone, Debug, PartialEq)]
pub enum SanitizedTable {
    Head(Head),
    Maxp(Maxp),
    Hdmx(Hdmx),
    Passthrough(Passthrough),
}

impl SanitizedTable {
    pub fn tag(&self) -> Tag {
        match self {
            SanitizedTable::Head(_) => Head::TAG,
            SanitizedTable::Maxp(_) => Maxp::TAG,
            SanitizedTable::Hdmx(_) => Hdmx::TAG,
            SanitizedTable::Passthrough(table) => table.tag(),
        }
    }

    pub fn should_serialize(&self, font: &Font) -> bool {
        match self {
            SanitizedTable::Head(table) => table.should_serialize(font),
            SanitizedTable::Maxp(table) => table.should_serialize(font),
            SanitizedTable::Hdmx(table) => table.should_serialize(font),
            SanitizedTable::Passthrough(_) => true,
        }
    }

    pub fn serialize(&self, font: &Font, s: &mut Serializer) -> Result<(), TableError> {
        match self {
            SanitizedTable::Head(table) => table.serialize(font, s),
            SanitizedTable::Maxp(table) => table.serialize(font, s),
            SanitizedTable::Hdmx(table) => table.serialize(font, s),
            SanitizedTable::Passthrough(table) => table.serialize(s),
        }
    }

    /// `true` if this table's validity depends on other tables in the font.
    pub fn has_prerequisites(&self) -> bool {
        matches!(self, SanitizedTable::Hdmx(_))
    }
}

/// Sanitize the table with the given tag.
///
/// Returns `None` if there is no sanitizer for this tag and pass-through
/// was not requested.
pub(crate) fn sanitize_table(
    tag: Tag,
    data: FontData,
    font: &Font,
    passthrough_unrecognized: bool,
) -> Option<Result<SanitizedTable, TableError>> {
    let result = match tag {
        Head::TAG => Head::sanitize(data, font).map(SanitizedTable::Head),
        Maxp::TAG => Maxp::sanitize(data, font).map(SanitizedTable::Maxp),
        Hdmx::TAG => Hdmx::sanitize(data, font).map(SanitizedTable::Hdmx),
        _ if passthrough_unrecognized => {
            Ok(SanitizedTable::Passthrough(Passthrough::new(tag, data)))
        }
        _ => return None,
    };
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_tables() {
        let font = Font::new();
        let tag = Tag::new(b"DSIG");
        let data = FontData::new(&[0, 0, 0, 1, 0, 0, 0, 0]);
        assert!(sanitize_table(tag, data, &font, false).is_none());

        let table = sanitize_table(tag, data, &font, true).unwrap().unwrap();
        assert_eq!(table.tag(), tag);
        assert!(table.should_serialize(&font));
        assert!(!table.has_prerequisites());
        let mut s = Serializer::new(64);
        table.serialize(&font, &mut s).unwrap();
        assert_eq!(s.copy_bytes().unwrap(), data.as_bytes());
    }

    #[test]
    fn passthrough_respects_size_limit() {
        let font = Font::new();
        let table = Passthrough::new(Tag::new(b"prep"), FontData::new(&[0xB0; 16]));
        let mut s = Serializer::new(8);
        let err = SanitizedTable::Passthrough(table)
            .serialize(&font, &mut s)
            .unwrap_err();
        assert!(matches!(err, TableError::Write { .. }));
    }
}
