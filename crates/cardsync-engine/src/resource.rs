//! Loading external vCard resources into the [`ResourceStore`].
//!
//! Filesystem problems (missing path, unreadable file) mean "resource
//! absent" and produce zero records; they never abort a session.

use std::fs;
use std::io::Read as _;
use std::path::Path;

use cardsync_core::{Charset, ResourceFormat};
use cardsync_vcard::decode;

use crate::store::ResourceStore;

/// How many leading bytes are inspected for the vCard marker.
const SNIFF_WINDOW: usize = 64;

/// Returns whether a file looks like a vCard resource: the first bytes
/// contain `BEGIN:VCARD`.
#[must_use]
pub fn is_contact_file(path: &Path) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut head = [0_u8; SNIFF_WINDOW];
    let mut taken = 0;
    let mut reader = file.take(SNIFF_WINDOW as u64);
    while let Ok(n) = reader.read(&mut head[taken..]) {
        if n == 0 {
            break;
        }
        taken += n;
    }
    head[..taken]
        .windows(b"BEGIN:VCARD".len())
        .any(|w| w == b"BEGIN:VCARD")
}

/// Loads every resource under the configured path into the store.
///
/// Directory format reads each recognizable file in name order; file
/// format reads the single file. Each decoded record is addressed by its
/// (path, position) pair for the rest of the session.
pub fn load_resources(
    store: &mut ResourceStore,
    book: &str,
    path: &Path,
    format: ResourceFormat,
    import_charset: Charset,
) {
    match format {
        ResourceFormat::VCardDir => load_directory(store, book, path, import_charset),
        ResourceFormat::VCardFile => load_file(store, book, path, import_charset),
    }
}

fn load_directory(store: &mut ResourceStore, book: &str, dir: &Path, charset: Charset) {
    let Ok(entries) = fs::read_dir(dir) else {
        tracing::debug!(path = %dir.display(), "resource directory absent");
        return;
    };
    let mut files: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    for file in files {
        if is_contact_file(&file) {
            load_file(store, book, &file, charset);
        }
    }
}

fn load_file(store: &mut ResourceStore, book: &str, file: &Path, charset: Charset) {
    let Ok(data) = fs::read(file) else {
        tracing::debug!(path = %file.display(), "resource file absent");
        return;
    };
    let records = decode(&data, charset);
    tracing::debug!(path = %file.display(), count = records.len(), "decoded resource");
    store.insert_decoded(book, file, records);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::random_numerals;
    use cardsync_core::Property;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cardsync-res-{}", random_numerals()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn sniffs_vcard_marker_in_head() {
        let dir = temp_dir();
        let good = dir.join("a.vcf");
        fs::write(&good, "BEGIN:VCARD\r\nVERSION:2.1\r\nEND:VCARD\r\n").unwrap();
        let bad = dir.join("b.txt");
        fs::write(&bad, "just some text that is not a contact").unwrap();
        assert!(is_contact_file(&good));
        assert!(!is_contact_file(&bad));
        assert!(!is_contact_file(&dir.join("missing.vcf")));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_directory_is_absent_not_an_error() {
        let mut store = ResourceStore::new();
        load_resources(
            &mut store,
            "b",
            Path::new("/nonexistent/cardsync"),
            ResourceFormat::VCardDir,
            Charset::Utf8,
        );
        assert!(store.modified().is_empty());
        assert_eq!(store.iter_book("b").count(), 0);
    }

    #[test]
    fn directory_load_indexes_per_file() {
        let dir = temp_dir();
        fs::write(
            dir.join("one.vcf"),
            "BEGIN:VCARD\r\nVERSION:2.1\r\nFN:One\r\nEND:VCARD\r\n",
        )
        .unwrap();
        fs::write(
            dir.join("two.vcf"),
            "BEGIN:VCARD\r\nVERSION:2.1\r\nFN:Two\r\nEND:VCARD\r\n",
        )
        .unwrap();
        fs::write(dir.join("notes.txt"), "unrelated").unwrap();

        let mut store = ResourceStore::new();
        load_resources(&mut store, "b", &dir, ResourceFormat::VCardDir, Charset::Utf8);
        let names: Vec<_> = store
            .iter_book("b")
            .map(|(_, _, r)| r.get(Property::DisplayName).to_string())
            .collect();
        assert_eq!(names, vec!["One", "Two"]);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn file_load_handles_concatenated_cards() {
        let dir = temp_dir();
        let file = dir.join("all.vcf");
        fs::write(
            &file,
            "BEGIN:VCARD\r\nVERSION:2.1\r\nFN:One\r\nEND:VCARD\r\n\r\n\
             BEGIN:VCARD\r\nVERSION:2.1\r\nFN:Two\r\nEND:VCARD\r\n",
        )
        .unwrap();
        let mut store = ResourceStore::new();
        load_resources(&mut store, "b", &file, ResourceFormat::VCardFile, Charset::Utf8);
        assert_eq!(store.iter_book("b").count(), 2);
        assert_eq!(store.get("b", &file, 1).unwrap().get(Property::DisplayName), "Two");
        fs::remove_dir_all(dir).unwrap();
    }
}
