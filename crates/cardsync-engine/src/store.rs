//! The in-session cache of decoded remote resources.
//!
//! Records are addressed positionally by (address-book, resource path,
//! index). Deletion nulls the slot instead of compacting, so sibling
//! indices stay valid for the rest of the session; write-back filters the
//! null slots out. Every mutation that changes a value marks its (book,
//! path) pair dirty for selective write-back.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use cardsync_core::{ContactRecord, PhotoAttachment, Property};

type ResourceKey = (String, PathBuf);

#[derive(Debug, Default)]
pub struct ResourceStore {
    records: BTreeMap<ResourceKey, Vec<Option<ContactRecord>>>,
    modified: BTreeSet<ResourceKey>,
}

impl ResourceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the decoded contents of one resource. Empty decodes do
    /// not create an entry.
    pub fn insert_decoded(&mut self, book: &str, path: &Path, records: Vec<ContactRecord>) {
        if records.is_empty() {
            return;
        }
        self.records
            .entry(key(book, path))
            .or_default()
            .extend(records.into_iter().map(Some));
    }

    /// Returns the record at a positional address.
    #[must_use]
    pub fn get(&self, book: &str, path: &Path, index: usize) -> Option<&ContactRecord> {
        self.records
            .get(&key(book, path))?
            .get(index)?
            .as_ref()
    }

    /// Returns a property value at a positional address, or `""`.
    #[must_use]
    pub fn get_value(&self, book: &str, path: &Path, index: usize, property: Property) -> String {
        self.get(book, path, index)
            .map_or_else(String::new, |r| r.get(property).to_string())
    }

    /// Sets a property value, marking the resource dirty when the value
    /// actually changes.
    pub fn set_value(
        &mut self,
        book: &str,
        path: &Path,
        index: usize,
        property: Property,
        value: &str,
    ) {
        let k = key(book, path);
        let Some(record) = self
            .records
            .get_mut(&k)
            .and_then(|slots| slots.get_mut(index))
            .and_then(Option::as_mut)
        else {
            return;
        };
        if record.get(property) != value {
            record.set(property, value);
            self.modified.insert(k);
        }
    }

    /// Replaces the photo attachment, marking the resource dirty when it
    /// actually changes.
    pub fn set_photo(
        &mut self,
        book: &str,
        path: &Path,
        index: usize,
        photo: PhotoAttachment,
    ) {
        let k = key(book, path);
        let Some(record) = self
            .records
            .get_mut(&k)
            .and_then(|slots| slots.get_mut(index))
            .and_then(Option::as_mut)
        else {
            return;
        };
        if record.photo() != &photo {
            record.set_photo(photo);
            self.modified.insert(k);
        }
    }

    /// Appends a new record to a (possibly new) path bucket and returns
    /// its index. The resource is marked dirty.
    pub fn append(&mut self, book: &str, path: &Path, record: ContactRecord) -> usize {
        let k = key(book, path);
        let slots = self.records.entry(k.clone()).or_default();
        slots.push(Some(record));
        self.modified.insert(k);
        slots.len() - 1
    }

    /// Nulls the slot at a positional address, preserving sibling indices.
    pub fn remove(&mut self, book: &str, path: &Path, index: usize) {
        let k = key(book, path);
        if let Some(slot) = self.records.get_mut(&k).and_then(|slots| slots.get_mut(index)) {
            if slot.take().is_some() {
                self.modified.insert(k);
            }
        }
    }

    /// Iterates all live records of one address-book in path order.
    pub fn iter_book<'a>(
        &'a self,
        book: &'a str,
    ) -> impl Iterator<Item = (&'a Path, usize, &'a ContactRecord)> + 'a {
        self.records
            .iter()
            .filter(move |((b, _), _)| b == book)
            .flat_map(|((_, path), slots)| {
                slots
                    .iter()
                    .enumerate()
                    .filter_map(move |(i, slot)| slot.as_ref().map(|r| (path.as_path(), i, r)))
            })
    }

    /// The surviving (non-null) records of one resource.
    #[must_use]
    pub fn surviving(&self, book: &str, path: &Path) -> Vec<&ContactRecord> {
        self.records
            .get(&key(book, path))
            .map(|slots| slots.iter().filter_map(Option::as_ref).collect())
            .unwrap_or_default()
    }

    /// The dirty (book, path) pairs, in order.
    #[must_use]
    pub fn modified(&self) -> Vec<(String, PathBuf)> {
        self.modified.iter().cloned().collect()
    }
}

fn key(book: &str, path: &Path) -> ResourceKey {
    (book.to_string(), path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(uid: &str) -> ContactRecord {
        let mut r = ContactRecord::new();
        r.set_uid(uid);
        r
    }

    fn path() -> PathBuf {
        PathBuf::from("/contacts/a.vcf")
    }

    #[test]
    fn empty_decode_creates_no_entry() {
        let mut store = ResourceStore::new();
        store.insert_decoded("b", &path(), Vec::new());
        assert!(store.get("b", &path(), 0).is_none());
        assert!(store.modified().is_empty());
    }

    #[test]
    fn set_value_marks_dirty_only_on_change() {
        let mut store = ResourceStore::new();
        store.insert_decoded("b", &path(), vec![record("u1")]);
        store.set_value("b", &path(), 0, Property::FirstName, "");
        assert!(store.modified().is_empty());

        store.set_value("b", &path(), 0, Property::FirstName, "Ann");
        assert_eq!(store.modified().len(), 1);
        assert_eq!(store.get_value("b", &path(), 0, Property::FirstName), "Ann");
    }

    #[test]
    fn remove_preserves_sibling_indices() {
        let mut store = ResourceStore::new();
        store.insert_decoded("b", &path(), vec![record("u1"), record("u2"), record("u3")]);
        store.remove("b", &path(), 1);
        assert!(store.get("b", &path(), 1).is_none());
        assert_eq!(store.get("b", &path(), 2).unwrap().uid(), "u3");
        assert_eq!(store.surviving("b", &path()).len(), 2);
    }

    #[test]
    fn append_allocates_new_bucket() {
        let mut store = ResourceStore::new();
        let new_path = PathBuf::from("/contacts/new.vcf");
        let index = store.append("b", &new_path, record("u9"));
        assert_eq!(index, 0);
        assert_eq!(store.get("b", &new_path, 0).unwrap().uid(), "u9");
        assert_eq!(store.modified(), vec![("b".to_string(), new_path)]);
    }

    #[test]
    fn iter_book_skips_nulled_slots_and_other_books() {
        let mut store = ResourceStore::new();
        store.insert_decoded("b", &path(), vec![record("u1"), record("u2")]);
        store.insert_decoded("other", &path(), vec![record("x1")]);
        store.remove("b", &path(), 0);
        let uids: Vec<_> = store.iter_book("b").map(|(_, _, r)| r.uid().to_string()).collect();
        assert_eq!(uids, vec!["u2"]);
    }
}
