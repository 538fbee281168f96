//! Errors reported while sanitizing tables and fonts.

use font_types::Tag;
use thiserror::Error;

use crate::{font_data::ReadError, serialize::SerializeErrorFlags};

/// How bad a table failure is.
///
/// Both outcomes remove the table from the output. They differ in what the
/// caller is told: a dropped table is an expected, recoverable condition,
/// while an errored table points at corrupt or crafted input, and the
/// font-level policy may decide to reject the whole file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Omit the table; the font is still usable without it.
    Drop,
    /// The table (or a table it depends on) is invalid.
    Error,
}

/// A failure while parsing or serializing a single table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("failed to read {context}: {source}")]
    ShortRead {
        context: String,
        #[source]
        source: ReadError,
    },
    #[error("missing '{required}' table, needed by '{table}'")]
    MissingPrerequisite { table: Tag, required: Tag },
    #[error("table discarded: {0}")]
    Recoverable(String),
    #[error("{0}")]
    Malformed(String),
    #[error("{0}")]
    OutputConstraint(String),
    #[error("failed to write {context}: {flags}")]
    Write {
        context: String,
        flags: SerializeErrorFlags,
    },
}

impl TableError {
    /// Classify this failure.
    pub fn severity(&self) -> Severity {
        match self {
            TableError::Recoverable(_) => Severity::Drop,
            TableError::ShortRead { .. }
            | TableError::MissingPrerequisite { .. }
            | TableError::Malformed(_)
            | TableError::OutputConstraint(_)
            | TableError::Write { .. } => Severity::Error,
        }
    }

    pub fn is_drop(&self) -> bool {
        self.severity() == Severity::Drop
    }

    pub(crate) fn short_read(context: impl Into<String>) -> impl FnOnce(ReadError) -> Self {
        let context = context.into();
        move |source| TableError::ShortRead { context, source }
    }

    pub(crate) fn write(context: impl Into<String>) -> impl FnOnce(SerializeErrorFlags) -> Self {
        let context = context.into();
        move |flags| TableError::Write { context, flags }
    }
}

/// A failure that rejects a whole font file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("Error reading font file: {0}")]
    InvalidContainer(ReadError),
    #[error("Unsupported sfnt version 0x{0:08X}")]
    UnsupportedVersion(u32),
    #[error("Font collection contains no fonts")]
    NoFonts,
    #[error("Duplicate '{0}' table")]
    DuplicateTable(Tag),
    #[error("Required table '{0}' is missing or was discarded")]
    MissingRequiredTable(Tag),
    #[error("Sanitizing table '{tag}' failed: {source}")]
    Table {
        tag: Tag,
        #[source]
        source: TableError,
    },
    #[error("Invalid tag {0}")]
    InvalidTag(String),
}

impl From<ReadError> for SanitizeError {
    fn from(src: ReadError) -> SanitizeError {
        SanitizeError::InvalidContainer(src)
    }
}
