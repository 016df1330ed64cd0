//! vCard 2.1 encoding.
//!
//! Produces one `BEGIN:VCARD` .. `END:VCARD` block per record, CRLF line
//! endings throughout. Values are charset-converted first; the
//! quoted-printable or Base64 sub-encoding is then applied over the
//! converted bytes, so a decoder reverses the layers in the opposite order.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cardsync_core::types::ResolvedCharset;
use cardsync_core::{Charset, ContactRecord, PhotoAttachment, Property};
use thiserror::Error;

use super::fold::{fold_base64, fold_qp, fold_text};
use super::qp::encode_qp;
use crate::photo;

/// An error that occurred while encoding a record.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A value cannot be represented in the configured charset. The caller
    /// may retry once with UTF-8.
    #[error("value of {property} not representable in charset {charset}")]
    Unmappable {
        property: &'static str,
        charset: &'static str,
    },
}

/// Resolves photo file references to image bytes.
///
/// The codec never touches the filesystem itself; the engine supplies an
/// implementation backed by the managed photo directory.
pub trait PhotoSource {
    /// Returns the bytes of the named photo file, or `None` when the file
    /// is missing or unreadable (the photo is then silently dropped).
    fn read_photo(&self, name: &str) -> Option<Vec<u8>>;
}

/// A [`PhotoSource`] with no backing storage.
pub struct NoPhotos;

impl PhotoSource for NoPhotos {
    fn read_photo(&self, _name: &str) -> Option<Vec<u8>> {
        None
    }
}

/// Per-address-book encoding options.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub charset: Charset,
    /// Mirror the UID into an `X-MOZILLA-PROPERTY` line.
    pub hide_uid: bool,
    /// Prefer quoted-printable over Base64 for multi-line values.
    pub quoted_printable: bool,
    /// Fold long property lines.
    pub folding: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            charset: Charset::Standard,
            hide_uid: false,
            quoted_printable: true,
            folding: true,
        }
    }
}

/// Encodes one contact record as a vCard 2.1 block.
///
/// ## Errors
/// Returns an error if a value cannot be represented in the configured
/// charset; the caller may retry with UTF-8.
pub fn encode(
    record: &ContactRecord,
    options: &EncodeOptions,
    photos: &dyn PhotoSource,
) -> Result<Vec<u8>, EncodeError> {
    let mut w = Writer {
        out: Vec::with_capacity(512),
        charset: options.charset.export(),
        options,
    };

    w.push_str("BEGIN:VCARD\r\nVERSION:2.1\r\n");
    w.emit_revision(record);
    w.emit_name(record)?;
    w.emit_simple_charset("FN", record, Property::DisplayName)?;
    w.emit_uid(record);
    w.emit_plain("EMAIL;TYPE=INTERNET", record.get(Property::PrimaryEmail))?;
    w.emit_plain("EMAIL;TYPE=INTERNET", record.get(Property::SecondEmail))?;
    w.emit_address(record, "HOME", HOME_ADDRESS)?;
    w.emit_address(record, "WORK", WORK_ADDRESS)?;
    w.emit_plain("TEL;HOME;VOICE", record.get(Property::HomePhone))?;
    w.emit_plain("TEL;WORK;VOICE", record.get(Property::WorkPhone))?;
    w.emit_plain("TEL;FAX", record.get(Property::FaxNumber))?;
    w.emit_plain("TEL;CELL", record.get(Property::CellularNumber))?;
    w.emit_plain("TEL;PAGER", record.get(Property::PagerNumber))?;
    w.emit_simple_charset("TITLE", record, Property::JobTitle)?;
    w.emit_organization(record)?;
    w.emit_plain("URL;TYPE=WORK", record.get(Property::WebPage1))?;
    w.emit_plain("URL;TYPE=HOME", record.get(Property::WebPage2))?;
    w.emit_birthday(record)?;
    w.emit_text("NOTE", "", record.get(Property::Notes), "Notes")?;
    w.emit_extensions(record)?;
    w.emit_messengers(record)?;
    w.emit_photo(record, photos);
    w.push_str("END:VCARD\r\n");

    Ok(w.out)
}

const HOME_ADDRESS: [Property; 6] = [
    Property::HomeAddress2,
    Property::HomeAddress,
    Property::HomeCity,
    Property::HomeState,
    Property::HomeZipCode,
    Property::HomeCountry,
];

const WORK_ADDRESS: [Property; 6] = [
    Property::WorkAddress2,
    Property::WorkAddress,
    Property::WorkCity,
    Property::WorkState,
    Property::WorkZipCode,
    Property::WorkCountry,
];

struct Writer<'a> {
    out: Vec<u8>,
    charset: ResolvedCharset,
    options: &'a EncodeOptions,
}

impl Writer<'_> {
    fn push_str(&mut self, s: &str) {
        self.out.extend_from_slice(s.as_bytes());
    }

    fn push_crlf(&mut self) {
        self.out.extend_from_slice(b"\r\n");
    }

    fn convert(&self, value: &str, property: &'static str) -> Result<Vec<u8>, EncodeError> {
        self.charset
            .encode_str(value)
            .ok_or(EncodeError::Unmappable {
                property,
                charset: self.charset.label,
            })
    }

    /// `REV` from the epoch-seconds modification stamp, when positive.
    fn emit_revision(&mut self, record: &ContactRecord) {
        let Ok(epoch) = record.get(Property::LastModifiedDate).parse::<i64>() else {
            return;
        };
        if epoch <= 0 {
            return;
        }
        if let Some(stamp) = chrono::DateTime::from_timestamp(epoch, 0) {
            self.push_str(&format!("REV:{}\r\n", stamp.format("%Y-%m-%dT%H:%M:%SZ")));
        }
    }

    /// Compound `N`, emitted only when a name component is present.
    fn emit_name(&mut self, record: &ContactRecord) -> Result<(), EncodeError> {
        let last = escape_semicolons(record.get(Property::LastName));
        let first = escape_semicolons(record.get(Property::FirstName));
        if last.is_empty() && first.is_empty() {
            return Ok(());
        }
        self.push_str(&format!("N;CHARSET={}:", self.charset.label));
        let bytes = self.convert(&format!("{last};{first};;;"), "Name")?;
        self.out.extend_from_slice(&bytes);
        self.push_crlf();
        Ok(())
    }

    fn emit_uid(&mut self, record: &ContactRecord) {
        let uid = record.uid();
        if uid.is_empty() {
            return;
        }
        self.push_str(&format!("UID:{uid}\r\n"));
        if self.options.hide_uid {
            self.push_str(&format!("X-MOZILLA-PROPERTY:UID;{uid}\r\n"));
        }
    }

    /// A property line with `CHARSET=` parameter, skipped when empty.
    fn emit_simple_charset(
        &mut self,
        name: &str,
        record: &ContactRecord,
        property: Property,
    ) -> Result<(), EncodeError> {
        let value = record.get(property);
        if value.is_empty() {
            return Ok(());
        }
        let bytes = self.convert(value, property.as_str())?;
        self.push_str(&format!("{name};CHARSET={}:", self.charset.label));
        self.out.extend_from_slice(&bytes);
        self.push_crlf();
        Ok(())
    }

    /// A property line without parameters, skipped when empty.
    fn emit_plain(&mut self, name: &str, value: &str) -> Result<(), EncodeError> {
        if value.is_empty() {
            return Ok(());
        }
        let bytes = self.convert(value, "value")?;
        self.push_str(&format!("{name}:"));
        self.out.extend_from_slice(&bytes);
        self.push_crlf();
        Ok(())
    }

    /// Compound `ADR` with a leading empty PO-box field, emitted only when
    /// the joined fields are longer than the five bare separators.
    fn emit_address(
        &mut self,
        record: &ContactRecord,
        adr_type: &str,
        fields: [Property; 6],
    ) -> Result<(), EncodeError> {
        let joined = fields
            .iter()
            .map(|&p| escape_semicolons(record.get(p)))
            .collect::<Vec<_>>()
            .join(";");
        if joined.chars().count() <= 5 {
            return Ok(());
        }
        let bytes = self.convert(&joined, "Address")?;
        self.push_str(&format!(
            "ADR;TYPE={adr_type};CHARSET={}:;",
            self.charset.label
        ));
        self.out.extend_from_slice(&bytes);
        self.push_crlf();
        Ok(())
    }

    /// Compound `ORG` (company;department).
    fn emit_organization(&mut self, record: &ContactRecord) -> Result<(), EncodeError> {
        let company = escape_semicolons(record.get(Property::Company));
        let department = escape_semicolons(record.get(Property::Department));
        if company.is_empty() && department.is_empty() {
            return Ok(());
        }
        let bytes = self.convert(&format!("{company};{department}"), "Company")?;
        self.push_str(&format!("ORG;CHARSET={}:", self.charset.label));
        self.out.extend_from_slice(&bytes);
        self.push_crlf();
        Ok(())
    }

    /// `BDAY` as `YYYYMMDD` when the date is complete; otherwise each
    /// present part goes out as an extension property.
    fn emit_birthday(&mut self, record: &ContactRecord) -> Result<(), EncodeError> {
        let year = record.get(Property::BirthYear);
        let month = record.get(Property::BirthMonth);
        let day = record.get(Property::BirthDay);
        if let (Some(y), Some(m), Some(d)) = (year.get(..4), month.get(..2), day.get(..2)) {
            self.push_str(&format!("BDAY:{y}{m}{d}\r\n"));
            return Ok(());
        }
        for (name, value) in [("BirthYear", year), ("BirthMonth", month), ("BirthDay", day)] {
            if !value.is_empty() {
                self.push_str(&format!("X-MOZILLA-PROPERTY:{name};{value}\r\n"));
            }
        }
        Ok(())
    }

    /// A text property that may need a sub-encoding: values with line
    /// breaks use quoted-printable (or Base64 when disabled); plain values
    /// are folded at word boundaries.
    fn emit_text(
        &mut self,
        base: &str,
        label: &str,
        value: &str,
        property: &'static str,
    ) -> Result<(), EncodeError> {
        if value.is_empty() {
            return Ok(());
        }
        let bytes = self.convert(value, property)?;
        let cs = self.charset.label;

        if value.contains('\n') {
            if self.options.quoted_printable {
                let prefix = format!("{base};CHARSET={cs};ENCODING=QUOTED-PRINTABLE:{label}");
                let encoded = encode_qp(&bytes);
                self.push_str(&prefix);
                if self.options.folding {
                    self.push_str(&fold_qp(&encoded, prefix.len()));
                } else {
                    self.push_str(&encoded);
                }
                self.push_crlf();
            } else {
                let prefix = format!("{base};CHARSET={cs};ENCODING=BASE64:{label}");
                let encoded = BASE64.encode(&bytes);
                self.push_str(&prefix);
                if self.options.folding {
                    self.push_str(&fold_base64(&encoded, prefix.len()));
                    self.push_crlf();
                } else {
                    self.push_str(&encoded);
                }
                self.push_crlf();
            }
            return Ok(());
        }

        let mut line = format!("{base};CHARSET={cs}:{label}").into_bytes();
        line.extend_from_slice(&bytes);
        if self.options.folding {
            let folded = fold_text(&line);
            self.out.extend_from_slice(&folded);
        } else {
            self.out.extend_from_slice(&line);
        }
        self.push_crlf();
        Ok(())
    }

    /// Extension properties as `X-MOZILLA-PROPERTY:name;value` lines.
    /// Messenger handles are skipped here; they get dedicated lines.
    fn emit_extensions(&mut self, record: &ContactRecord) -> Result<(), EncodeError> {
        for &property in Property::EXTENSIONS {
            if Property::MESSENGERS.iter().any(|&(p, _)| p == property) {
                continue;
            }
            let value = escape_semicolons(record.get(property));
            let label = format!("{};", property.as_str());
            self.emit_text("X-MOZILLA-PROPERTY", &label, &value, property.as_str())?;
        }
        for (name, value) in record.extras() {
            let escaped = escape_semicolons(value);
            let label = format!("{name};");
            self.emit_text("X-MOZILLA-PROPERTY", &label, &escaped, "extension")?;
        }
        Ok(())
    }

    fn emit_messengers(&mut self, record: &ContactRecord) -> Result<(), EncodeError> {
        for &(property, line_name) in Property::MESSENGERS {
            self.emit_plain(line_name, record.get(property))?;
        }
        Ok(())
    }

    /// `PHOTO`: web references by URL, everything else as embedded Base64
    /// with the type sniffed from magic bytes. Unknown formats and
    /// unreadable files are dropped.
    fn emit_photo(&mut self, record: &ContactRecord, photos: &dyn PhotoSource) {
        let data = match record.photo() {
            PhotoAttachment::None => return,
            PhotoAttachment::Web(uri) => {
                self.push_str(&format!("PHOTO;VALUE=URL:{uri}\r\n"));
                return;
            }
            PhotoAttachment::Binary(data) => data.clone(),
            PhotoAttachment::File(name) => {
                let Some(data) = photos.read_photo(name) else {
                    tracing::debug!(name, "photo file unreadable, dropping");
                    return;
                };
                data
            }
        };
        let Some(photo_type) = photo::sniff_vcard_type(&data) else {
            tracing::debug!("unrecognized photo format, dropping");
            return;
        };
        let prefix = format!("PHOTO;ENCODING=BASE64;TYPE={photo_type}:");
        let encoded = BASE64.encode(&data);
        self.push_str(&prefix);
        if self.options.folding {
            self.push_str(&fold_base64(&encoded, prefix.len()));
            self.push_crlf();
        } else {
            self.push_str(&encoded);
        }
        self.push_crlf();
    }
}

fn escape_semicolons(value: &str) -> String {
    value.replace(';', "\\;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_utf8(record: &ContactRecord) -> String {
        let options = EncodeOptions {
            charset: Charset::Utf8,
            ..EncodeOptions::default()
        };
        String::from_utf8(encode(record, &options, &NoPhotos).unwrap()).unwrap()
    }

    #[test]
    fn minimal_record() {
        let record = ContactRecord::new();
        assert_eq!(encode_utf8(&record), "BEGIN:VCARD\r\nVERSION:2.1\r\nEND:VCARD\r\n");
    }

    #[test]
    fn name_and_email_lines() {
        let mut record = ContactRecord::new();
        record.set(Property::LastName, "Lee");
        record.set(Property::FirstName, "Ann");
        record.set(Property::PrimaryEmail, "a@x.com");
        let vcf = encode_utf8(&record);
        assert!(vcf.contains("N;CHARSET=UTF-8:Lee;Ann;;;\r\n"));
        assert!(vcf.contains("EMAIL;TYPE=INTERNET:a@x.com\r\n"));
    }

    #[test]
    fn semicolons_in_names_are_masked() {
        let mut record = ContactRecord::new();
        record.set(Property::LastName, "Doe;Jr");
        let vcf = encode_utf8(&record);
        assert!(vcf.contains("N;CHARSET=UTF-8:Doe\\;Jr;;;;\r\n"));
    }

    #[test]
    fn empty_address_is_skipped() {
        let mut record = ContactRecord::new();
        record.set(Property::HomeCity, "Kiel");
        let vcf = encode_utf8(&record);
        assert!(vcf.contains("ADR;TYPE=HOME;CHARSET=UTF-8:;;;Kiel;;;\r\n"));
        assert!(!vcf.contains("ADR;TYPE=WORK"));
    }

    #[test]
    fn complete_birthday_collapses_to_bday() {
        let mut record = ContactRecord::new();
        record.set(Property::BirthYear, "1984");
        record.set(Property::BirthMonth, "03");
        record.set(Property::BirthDay, "07");
        assert!(encode_utf8(&record).contains("BDAY:19840307\r\n"));
    }

    #[test]
    fn partial_birthday_falls_back_to_extension_lines() {
        let mut record = ContactRecord::new();
        record.set(Property::BirthYear, "1984");
        let vcf = encode_utf8(&record);
        assert!(!vcf.contains("BDAY:"));
        assert!(vcf.contains("X-MOZILLA-PROPERTY:BirthYear;1984\r\n"));
    }

    #[test]
    fn multiline_note_uses_quoted_printable() {
        let mut record = ContactRecord::new();
        record.set(Property::Notes, "line one\nline two");
        let vcf = encode_utf8(&record);
        assert!(vcf.contains("NOTE;CHARSET=UTF-8;ENCODING=QUOTED-PRINTABLE:line one=0Aline two\r\n"));
    }

    #[test]
    fn multiline_note_without_qp_uses_base64() {
        let mut record = ContactRecord::new();
        record.set(Property::Notes, "a\nb");
        let options = EncodeOptions {
            charset: Charset::Utf8,
            quoted_printable: false,
            folding: false,
            ..EncodeOptions::default()
        };
        let vcf = String::from_utf8(encode(&record, &options, &NoPhotos).unwrap()).unwrap();
        assert!(vcf.contains("NOTE;CHARSET=UTF-8;ENCODING=BASE64:YQpi\r\n"));
    }

    #[test]
    fn hidden_uid_is_mirrored() {
        let mut record = ContactRecord::new();
        record.set_uid("1234");
        let options = EncodeOptions {
            charset: Charset::Utf8,
            hide_uid: true,
            ..EncodeOptions::default()
        };
        let vcf = String::from_utf8(encode(&record, &options, &NoPhotos).unwrap()).unwrap();
        assert!(vcf.contains("UID:1234\r\n"));
        assert!(vcf.contains("X-MOZILLA-PROPERTY:UID;1234\r\n"));
    }

    #[test]
    fn messenger_handles_get_dedicated_lines() {
        let mut record = ContactRecord::new();
        record.set(Property::JabberId, "ann@jabber.org");
        let vcf = encode_utf8(&record);
        assert!(vcf.contains("X-JABBER:ann@jabber.org\r\n"));
        assert!(!vcf.contains("X-MOZILLA-PROPERTY:_JabberId"));
    }

    #[test]
    fn binary_photo_is_embedded_with_sniffed_type() {
        let mut record = ContactRecord::new();
        record.set_photo(PhotoAttachment::Binary(vec![0xFF, 0xD8, 0x00, 0x01]));
        let vcf = encode_utf8(&record);
        assert!(vcf.contains("PHOTO;ENCODING=BASE64;TYPE=JPEG:"));
    }

    #[test]
    fn unknown_photo_format_is_dropped() {
        let mut record = ContactRecord::new();
        record.set_photo(PhotoAttachment::Binary(b"not an image".to_vec()));
        assert!(!encode_utf8(&record).contains("PHOTO"));
    }

    #[test]
    fn web_photo_is_a_url_reference() {
        let mut record = ContactRecord::new();
        record.set_photo(PhotoAttachment::Web("http://example.com/p.png".into()));
        assert!(encode_utf8(&record).contains("PHOTO;VALUE=URL:http://example.com/p.png\r\n"));
    }

    #[test]
    fn unmappable_value_reports_charset() {
        let mut record = ContactRecord::new();
        record.set(Property::Notes, "日本語");
        let options = EncodeOptions {
            charset: Charset::Iso8859_1,
            ..EncodeOptions::default()
        };
        let err = encode(&record, &options, &NoPhotos).unwrap_err();
        assert!(matches!(err, EncodeError::Unmappable { charset: "ISO-8859-1", .. }));
    }

    #[test]
    fn latin1_charset_converts_values() {
        let mut record = ContactRecord::new();
        record.set(Property::LastName, "Müller");
        let options = EncodeOptions {
            charset: Charset::Iso8859_1,
            ..EncodeOptions::default()
        };
        let vcf = encode(&record, &options, &NoPhotos).unwrap();
        let needle = b"N;CHARSET=ISO-8859-1:M\xfcller;;;;\r\n";
        assert!(vcf.windows(needle.len()).any(|w| w == needle));
    }
}
