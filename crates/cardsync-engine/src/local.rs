//! External collaborators: the local contact store and the managed photo
//! directory.
//!
//! The engine never talks to a concrete address-book implementation; it
//! drives these traits. In-memory implementations back the tests and the
//! JSON-snapshot stores of the command-line binary; the filesystem photo
//! store backs the managed photo directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use cardsync_core::{ContactRecord, CoreError, CoreResult};
use cardsync_vcard::PhotoSource;
use serde::{Deserialize, Serialize};

/// The local address-book store.
///
/// Mutation calls are individually atomic but not transactional across a
/// session.
pub trait ContactStore {
    /// Stable identifier of this address-book.
    fn id(&self) -> &str;

    /// Human-readable name for reporting.
    fn display_name(&self) -> &str;

    /// Snapshot of all contact records.
    fn records(&self) -> Vec<ContactRecord>;

    /// Looks up a record by exact UID equality.
    fn find_by_uid(&self, uid: &str) -> Option<ContactRecord>;

    /// Inserts or replaces the record with the same UID.
    fn upsert(&mut self, record: ContactRecord);

    /// Deletes the record with the given UID; returns whether one existed.
    fn delete(&mut self, uid: &str) -> bool;
}

/// The managed photo directory.
///
/// Extends the codec's read-only [`PhotoSource`] with write access so the
/// engine can convert embedded photo data into file references and clean
/// up after whole-contact deletions.
pub trait PhotoStore: PhotoSource {
    /// Stores image bytes under a fresh collision-free name and returns
    /// that name.
    ///
    /// ## Errors
    /// Returns an error if the directory is unusable or the bounded name
    /// allocation gives up.
    fn store_photo(&mut self, data: &[u8], suffix: &str) -> CoreResult<String>;

    /// Removes the named photo file. Removing a missing file is not an
    /// error.
    ///
    /// ## Errors
    /// Returns an error if the file exists but cannot be removed.
    fn remove_photo(&mut self, name: &str) -> CoreResult<()>;
}

/// An in-memory [`ContactStore`], also used as the JSON-snapshot store of
/// the command-line binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryContactStore {
    id: String,
    name: String,
    records: Vec<ContactRecord>,
}

impl MemoryContactStore {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            records: Vec::new(),
        }
    }

    /// Seeds the store with records (test setup and snapshot loading).
    pub fn insert(&mut self, record: ContactRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ContactStore for MemoryContactStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn records(&self) -> Vec<ContactRecord> {
        self.records.clone()
    }

    fn find_by_uid(&self, uid: &str) -> Option<ContactRecord> {
        self.records.iter().find(|r| r.uid() == uid).cloned()
    }

    fn upsert(&mut self, record: ContactRecord) {
        match self.records.iter_mut().find(|r| r.uid() == record.uid()) {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    fn delete(&mut self, uid: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.uid() != uid);
        self.records.len() != before
    }
}

/// An in-memory [`PhotoStore`] for tests.
#[derive(Debug, Default)]
pub struct MemoryPhotoStore {
    files: BTreeMap<String, Vec<u8>>,
    sequence: u64,
}

impl MemoryPhotoStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a photo file under a fixed name.
    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.insert(name.into(), data);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

impl PhotoSource for MemoryPhotoStore {
    fn read_photo(&self, name: &str) -> Option<Vec<u8>> {
        self.files.get(name).cloned()
    }
}

impl PhotoStore for MemoryPhotoStore {
    fn store_photo(&mut self, data: &[u8], suffix: &str) -> CoreResult<String> {
        self.sequence += 1;
        let name = format!("{}.{suffix}", self.sequence);
        self.files.insert(name.clone(), data.to_vec());
        Ok(name)
    }

    fn remove_photo(&mut self, name: &str) -> CoreResult<()> {
        self.files.remove(name);
        Ok(())
    }
}

/// Maximum attempts at allocating a collision-free photo file name.
const NAME_ATTEMPTS: u32 = 1024;

/// A [`PhotoStore`] backed by a flat directory of image files.
///
/// New files get random-numeral names in the style the host address-book
/// uses for its own photo imports.
#[derive(Debug, Clone)]
pub struct FsPhotoStore {
    dir: PathBuf,
}

impl FsPhotoStore {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl PhotoSource for FsPhotoStore {
    fn read_photo(&self, name: &str) -> Option<Vec<u8>> {
        fs::read(self.dir.join(name)).ok()
    }
}

impl PhotoStore for FsPhotoStore {
    fn store_photo(&mut self, data: &[u8], suffix: &str) -> CoreResult<String> {
        if !self.dir.is_dir() {
            return Err(CoreError::NotFound(format!(
                "photo directory {} does not exist",
                self.dir.display()
            )));
        }
        for _ in 0..NAME_ATTEMPTS {
            let name = format!("{}.{suffix}", random_numerals());
            let path = self.dir.join(&name);
            if !path.exists() {
                fs::write(&path, data)?;
                return Ok(name);
            }
        }
        Err(CoreError::InvariantViolation(
            "photo file name allocation exhausted",
        ))
    }

    fn remove_photo(&mut self, name: &str) -> CoreResult<()> {
        let path = self.dir.join(name);
        if path.is_file() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Random decimal digits for collision-free file names.
#[must_use]
pub fn random_numerals() -> String {
    uuid::Uuid::new_v4().as_u128().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsync_core::Property;

    fn record(uid: &str, first: &str) -> ContactRecord {
        let mut r = ContactRecord::new();
        r.set_uid(uid);
        r.set(Property::FirstName, first);
        r
    }

    #[test]
    fn upsert_replaces_by_uid() {
        let mut store = MemoryContactStore::new("book-1", "Personal");
        store.upsert(record("u1", "Ann"));
        store.upsert(record("u1", "Anna"));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.find_by_uid("u1").unwrap().get(Property::FirstName),
            "Anna"
        );
    }

    #[test]
    fn delete_reports_existence() {
        let mut store = MemoryContactStore::new("book-1", "Personal");
        store.upsert(record("u1", "Ann"));
        assert!(store.delete("u1"));
        assert!(!store.delete("u1"));
        assert!(store.is_empty());
    }

    #[test]
    fn memory_photos_allocate_fresh_names() {
        let mut photos = MemoryPhotoStore::new();
        let a = photos.store_photo(b"aaa", "png").unwrap();
        let b = photos.store_photo(b"bbb", "png").unwrap();
        assert_ne!(a, b);
        assert_eq!(photos.read_photo(&a), Some(b"aaa".to_vec()));
        photos.remove_photo(&a).unwrap();
        assert_eq!(photos.read_photo(&a), None);
    }

    #[test]
    fn fs_photos_round_trip() {
        let dir = std::env::temp_dir().join(format!("cardsync-test-{}", random_numerals()));
        fs::create_dir_all(&dir).unwrap();
        let mut photos = FsPhotoStore::new(dir.clone());
        let name = photos.store_photo(&[0xFF, 0xD8, 1, 2], "jpg").unwrap();
        assert!(name.ends_with(".jpg"));
        assert_eq!(photos.read_photo(&name), Some(vec![0xFF, 0xD8, 1, 2]));
        photos.remove_photo(&name).unwrap();
        assert_eq!(photos.read_photo(&name), None);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn fs_photos_require_directory() {
        let dir = std::env::temp_dir().join(format!("cardsync-missing-{}", random_numerals()));
        let mut photos = FsPhotoStore::new(dir);
        assert!(photos.store_photo(b"x", "png").is_err());
    }
}
