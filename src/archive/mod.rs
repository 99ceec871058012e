mod codec;
pub mod entry;
#[cfg(test)]
pub(crate) mod fixtures;
mod reader;
pub mod writer;

use bytes::Bytes;
use std::collections::HashMap;

use crate::error::Result;

pub use entry::{DosDateTime, Entry, EntryMetadata};
pub use writer::ArchiveWriter;

/// An in-memory ZIP catalog: entries in discovery order, addressable by path.
///
/// Paths are unique. Inserting an entry whose path is already present
/// replaces it in place, keeping the original position.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    comment: Option<String>,
}

impl Archive {
    /// Parse a ZIP archive from its bytes.
    ///
    /// Only the central directory and local headers are decoded; entry
    /// content is inflated when [`Entry::content`] is called. Fails with
    /// [`Error::CorruptArchive`](crate::Error::CorruptArchive) on anything
    /// that is not a well-formed single-disk, non-ZIP64 archive.
    pub fn parse(bytes: impl Into<Bytes>) -> Result<Self> {
        reader::parse(bytes.into())
    }

    /// Look up an entry by exact path.
    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Entries in discovery order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Entry::path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The archive-level comment from the end of central directory record.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub(crate) fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    /// Insert an entry, replacing any entry with the same path in place.
    /// Returns `true` when an existing entry was replaced.
    pub(crate) fn insert(&mut self, entry: Entry) -> bool {
        match self.index.get(entry.path()) {
            Some(&i) => {
                self.entries[i] = entry;
                true
            }
            None => {
                self.index.insert(entry.path().to_string(), self.entries.len());
                self.entries.push(entry);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &'static [u8]) -> Entry {
        Entry::file(path, Bytes::from_static(content), EntryMetadata::default())
    }

    #[test]
    fn test_insert_keeps_discovery_order() {
        let mut archive = Archive::default();
        archive.insert(file("b.txt", b"b"));
        archive.insert(file("a.txt", b"a"));

        assert_eq!(archive.paths().collect::<Vec<_>>(), vec!["b.txt", "a.txt"]);
        assert!(archive.contains("a.txt"));
        assert!(archive.get("c.txt").is_none());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut archive = Archive::default();
        assert!(!archive.insert(file("a.txt", b"first")));
        archive.insert(file("b.txt", b"b"));
        assert!(archive.insert(file("a.txt", b"second")));

        assert_eq!(archive.len(), 2);
        assert_eq!(archive.paths().collect::<Vec<_>>(), vec!["a.txt", "b.txt"]);
        assert_eq!(
            archive.get("a.txt").unwrap().content().unwrap(),
            Bytes::from_static(b"second")
        );
    }

    #[test]
    fn test_lookup_is_exact() {
        let mut archive = Archive::default();
        archive.insert(Entry::directory("dir", EntryMetadata::default()));

        assert!(archive.get("dir/").is_some());
        assert!(archive.get("dir").is_none());
        assert!(archive.get("DIR/").is_none());
    }
}
