//! A logical font: the set of tables that survived sanitization.

use std::{collections::BTreeMap, sync::Arc};

use font_types::Tag;

use crate::{
    hdmx::Hdmx,
    head::Head,
    maxp::Maxp,
    table::{Sanitize, SanitizedTable},
    GLYF,
};

/// A table held by a font.
///
/// The table itself is reference counted, so several fonts in a collection
/// can hold the same instance. `reused` records that this font adopted the
/// table from another font rather than parsing it.
#[derive(Clone, Debug)]
pub struct TableEntry {
    table: Arc<SanitizedTable>,
    reused: bool,
}

impl TableEntry {
    pub fn table(&self) -> &SanitizedTable {
        &self.table
    }

    pub fn is_reused(&self) -> bool {
        self.reused
    }

    /// The number of fonts currently holding this table.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.table)
    }
}

/// The tables of one font, keyed by tag.
#[derive(Clone, Debug, Default)]
pub struct Font {
    tables: BTreeMap<Tag, TableEntry>,
}

impl Font {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly sanitized table, owned by this font.
    pub fn insert(&mut self, table: SanitizedTable) {
        self.tables.insert(
            table.tag(),
            TableEntry {
                table: Arc::new(table),
                reused: false,
            },
        );
    }

    pub fn get(&self, tag: Tag) -> Option<&SanitizedTable> {
        self.tables.get(&tag).map(TableEntry::table)
    }

    pub fn entry(&self, tag: Tag) -> Option<&TableEntry> {
        self.tables.get(&tag)
    }

    /// Iterate over all tables, in tag order.
    pub fn entries(&self) -> impl Iterator<Item = (Tag, &TableEntry)> + '_ {
        self.tables.iter().map(|(tag, entry)| (*tag, entry))
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.tables.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn has_table(&self, tag: Tag) -> bool {
        self.tables.contains_key(&tag)
    }

    pub fn head(&self) -> Option<&Head> {
        match self.get(Head::TAG)? {
            SanitizedTable::Head(head) => Some(head),
            _ => None,
        }
    }

    pub fn maxp(&self) -> Option<&Maxp> {
        match self.get(Maxp::TAG)? {
            SanitizedTable::Maxp(maxp) => Some(maxp),
            _ => None,
        }
    }

    pub fn hdmx(&self) -> Option<&Hdmx> {
        match self.get(Hdmx::TAG)? {
            SanitizedTable::Hdmx(hdmx) => Some(hdmx),
            _ => None,
        }
    }

    /// `true` if this font stores TrueType outlines in a `glyf` table.
    ///
    /// Fonts with CFF outlines have no `glyf` table.
    pub fn is_outline_font(&self) -> bool {
        self.has_table(GLYF)
    }

    /// Adopt `other`'s instance of the table with this tag.
    ///
    /// The table is shared, not copied, and is never parsed again. Returns
    /// `false` if `other` has no such table.
    pub fn reuse_table(&mut self, other: &Font, tag: Tag) -> bool {
        let Some(entry) = other.tables.get(&tag) else {
            return false;
        };
        self.tables.insert(
            tag,
            TableEntry {
                table: entry.table.clone(),
                reused: true,
            },
        );
        true
    }

    /// `true` if both fonts hold the very same instance of this table.
    pub fn shares_table(&self, other: &Font, tag: Tag) -> bool {
        match (self.tables.get(&tag), other.tables.get(&tag)) {
            (Some(ours), Some(theirs)) => Arc::ptr_eq(&ours.table, &theirs.table),
            _ => false,
        }
    }

    /// Release this font's hold on a table.
    ///
    /// Returns `true` if the table was destroyed, and `false` if it was not
    /// present or is still held by another font.
    pub fn free_table(&mut self, tag: Tag) -> bool {
        let Some(entry) = self.tables.remove(&tag) else {
            return false;
        };
        Arc::try_unwrap(entry.table).is_ok()
    }

    pub(crate) fn shared_table(&self, tag: Tag) -> Option<&Arc<SanitizedTable>> {
        self.tables.get(&tag).map(|entry| &entry.table)
    }
}
