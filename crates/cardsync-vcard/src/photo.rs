//! Photo format sniffing.
//!
//! vCard 2.1 labels embedded photos with a `TYPE=` parameter; the local
//! store labels them with a file suffix. Both are derived from the leading
//! magic bytes of the image data.

/// File-suffix / vCard-type pairs for the supported photo formats.
const SUFFIX_TYPE_TABLE: &[(&str, &str)] = &[
    ("gif", "GIF"),
    ("png", "PNG"),
    ("jpg", "JPEG"),
    ("jpeg", "JPEG"),
    ("jpe", "JPEG"),
    ("jif", "JPEG"),
    ("jfif", "JPEG"),
    ("jfi", "JPEG"),
    ("tiff", "TIFF"),
    ("tif", "TIFF"),
    ("bmp", "BMP"),
    ("dip", "BMP"),
    ("pdf", "PDF"),
    ("ps", "PS"),
];

/// Sniffs the image format from leading magic bytes, returning the
/// canonical file suffix, or `None` for unrecognized data.
#[must_use]
pub fn sniff_suffix(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x47, 0x49, 0x46, 0x38]) {
        return Some("gif");
    }
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }
    if data.starts_with(&[0xFF, 0xD8]) {
        return Some("jpg");
    }
    if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return Some("tiff");
    }
    if data.starts_with(&[0x42, 0x4D]) {
        return Some("bmp");
    }
    if data.starts_with(b"%PDF") {
        return Some("pdf");
    }
    if data.starts_with(b"%!") {
        return Some("ps");
    }
    None
}

/// Sniffs the vCard `TYPE=` label from leading magic bytes.
#[must_use]
pub fn sniff_vcard_type(data: &[u8]) -> Option<&'static str> {
    sniff_suffix(data).and_then(type_for_suffix)
}

/// Maps a file suffix (case-insensitive) to the vCard `TYPE=` label.
#[must_use]
pub fn type_for_suffix(suffix: &str) -> Option<&'static str> {
    SUFFIX_TYPE_TABLE
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(suffix))
        .map(|&(_, t)| t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_suffix(b"GIF89a..."), Some("gif"));
        assert_eq!(
            sniff_suffix(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1]),
            Some("png")
        );
        assert_eq!(sniff_suffix(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpg"));
        assert_eq!(sniff_suffix(&[0x49, 0x49, 0x2A, 0x00]), Some("tiff"));
        assert_eq!(sniff_suffix(&[0x4D, 0x4D, 0x00, 0x2A]), Some("tiff"));
        assert_eq!(sniff_suffix(b"BM6"), Some("bmp"));
        assert_eq!(sniff_suffix(b"%PDF-1.4"), Some("pdf"));
        assert_eq!(sniff_suffix(b"%!PS-Adobe"), Some("ps"));
        assert_eq!(sniff_suffix(b"hello"), None);
        assert_eq!(sniff_suffix(b""), None);
    }

    #[test]
    fn suffixes_map_to_vcard_types() {
        assert_eq!(type_for_suffix("jpg"), Some("JPEG"));
        assert_eq!(type_for_suffix("JFIF"), Some("JPEG"));
        assert_eq!(type_for_suffix("gif"), Some("GIF"));
        assert_eq!(type_for_suffix("webp"), None);
    }

    #[test]
    fn vcard_type_from_magic() {
        assert_eq!(sniff_vcard_type(&[0xFF, 0xD8, 0, 0]), Some("JPEG"));
        assert_eq!(sniff_vcard_type(b"junk"), None);
    }
}
