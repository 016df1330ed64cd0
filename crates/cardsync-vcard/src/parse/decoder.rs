//! vCard 2.1 decoding.
//!
//! `decode` splits a byte stream at `END:VCARD` markers and decodes each
//! segment independently; a malformed segment is logged and skipped rather
//! than failing the batch. Per segment, the body is unfolded, lexed into
//! content lines, the quoted-printable / Base64 sub-encodings are reversed
//! over the raw bytes, and charset conversion is applied to every value
//! except `PHOTO` data.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cardsync_core::{Charset, ContactRecord, PhotoAttachment, Property};

use super::error::{ParseError, ParseResult};
use super::lexer::{self, ContentLine};

const BEGIN_MARKER: &[u8] = b"BEGIN:VCARD";
const END_MARKER: &[u8] = b"END:VCARD";

/// Decodes a stream of one or more concatenated vCards.
///
/// The fallback charset applies to lines without a `CHARSET=` parameter.
#[must_use]
pub fn decode(data: &[u8], fallback: Charset) -> Vec<ContactRecord> {
    let mut records = Vec::new();
    let mut rest = data;
    let mut segment = 0_usize;
    while let Some(pos) = find(rest, END_MARKER) {
        let reconstructed = reconstruct_segment(&rest[..pos]);
        match decode_single(&reconstructed, fallback) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::debug!(%error, segment, "skipping malformed vCard segment");
            }
        }
        rest = &rest[pos + END_MARKER.len()..];
        segment += 1;
    }
    records
}

/// Re-attaches the terminator a segment lost when the stream was split.
fn reconstruct_segment(segment: &[u8]) -> Vec<u8> {
    let trimmed = trim_newlines(segment);
    let mut out = Vec::with_capacity(trimmed.len() + 2 + END_MARKER.len());
    out.extend_from_slice(trimmed);
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(END_MARKER);
    out
}

fn trim_newlines(mut data: &[u8]) -> &[u8] {
    while let [b'\r' | b'\n', rest @ ..] = data {
        data = rest;
    }
    while let [rest @ .., b'\r' | b'\n'] = data {
        data = rest;
    }
    data
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

/// Decodes a single vCard block.
///
/// ## Errors
/// Returns an error if the data is not wrapped in a
/// `BEGIN:VCARD` / `END:VCARD` envelope.
pub fn decode_single(data: &[u8], fallback: Charset) -> ParseResult<ContactRecord> {
    let begin = find(data, BEGIN_MARKER).ok_or_else(|| ParseError::missing_envelope(1))?;
    let after_begin = &data[begin + BEGIN_MARKER.len()..];
    let after_begin = after_begin
        .strip_prefix(b"\r\n")
        .or_else(|| after_begin.strip_prefix(b"\n"))
        .ok_or_else(|| ParseError::missing_envelope(1))?;
    let end = rfind(after_begin, END_MARKER).ok_or_else(|| ParseError::missing_envelope(1))?;
    let body = lexer::unfold(&after_begin[..end]);

    let mut record = ContactRecord::new();
    for (index, raw) in lexer::split_crlf(&body).into_iter().enumerate() {
        if raw.is_empty() {
            continue;
        }
        let line = match lexer::split_content_line(raw, index + 2) {
            Ok(line) => line,
            Err(error) => {
                tracing::debug!(%error, "skipping unparseable content line");
                continue;
            }
        };
        apply_line(&mut record, &line, fallback);
    }
    Ok(record)
}

/// Reverses sub-encodings and charset conversion, then dispatches one
/// content line into the record.
fn apply_line(record: &mut ContactRecord, line: &ContentLine, fallback: Charset) {
    let values = decoded_values(line);

    if line.name == "PHOTO" {
        apply_photo(record, line, values);
        return;
    }

    let charset = line
        .params
        .get("CHARSET")
        .and_then(Charset::from_name)
        .unwrap_or(fallback)
        .import();
    let text: Vec<String> = values
        .iter()
        .map(|v| lexer::unescape(&charset.decode_bytes(v)))
        .collect();
    let val = |i: usize| text.get(i).map_or("", String::as_str);

    match line.name.as_str() {
        "FN" => record.set(Property::DisplayName, val(0)),
        "N" => {
            record.set(Property::LastName, val(0));
            record.set(Property::FirstName, val(1));
        }
        "BDAY" => apply_birthday(record, val(0)),
        "ADR" => apply_address(record, line, &text),
        "TEL" => {
            let property = if line.params.flag("CELL") {
                Property::CellularNumber
            } else if line.params.flag("FAX") {
                Property::FaxNumber
            } else if line.params.flag("PAGER") {
                Property::PagerNumber
            } else if line.params.flag("WORK") {
                Property::WorkPhone
            } else {
                Property::HomePhone
            };
            record.set(property, val(0));
        }
        "EMAIL" => {
            if !val(0).is_empty() {
                if record.get(Property::PrimaryEmail).is_empty() {
                    record.set(Property::PrimaryEmail, val(0));
                } else {
                    record.set(Property::SecondEmail, val(0));
                }
            }
        }
        "TITLE" => record.set(Property::JobTitle, val(0)),
        "ORG" => {
            record.set(Property::Company, val(0));
            record.set(Property::Department, val(1));
        }
        "NOTE" => record.set(Property::Notes, val(0)),
        "URL" => {
            if !val(0).is_empty() {
                let is_work = line.params.get("TYPE").is_some_and(|t| t.eq_ignore_ascii_case("WORK"))
                    || line.params.flag("WORK");
                let property = if is_work {
                    Property::WebPage1
                } else {
                    Property::WebPage2
                };
                record.set(property, val(0));
            }
        }
        "REV" => {
            if let Ok(stamp) = chrono::DateTime::parse_from_rfc3339(val(0)) {
                let epoch = stamp.timestamp();
                if epoch > 0 {
                    record.set(Property::LastModifiedDate, epoch.to_string());
                }
            }
        }
        "UID" => record.set_uid(val(0)),
        "X-MOZILLA-PROPERTY" => apply_extension(record, val(0), val(1)),
        name => {
            if let Some(&(property, _)) =
                Property::MESSENGERS.iter().find(|&&(_, n)| n == name)
            {
                record.set(property, val(0));
            }
        }
    }
}

/// Reverses the quoted-printable / Base64 sub-encoding per value segment.
fn decoded_values(line: &ContentLine) -> Vec<Vec<u8>> {
    let encoding = line.params.get("ENCODING");
    let qp = encoding.is_some_and(|e| e.eq_ignore_ascii_case("QUOTED-PRINTABLE"))
        || line.params.flag("QUOTED-PRINTABLE");
    let b64 = encoding.is_some_and(|e| e.eq_ignore_ascii_case("BASE64")) || line.params.flag("BASE64");

    line.values
        .iter()
        .map(|segment| {
            if qp {
                crate::build::qp::decode_qp(segment)
            } else if b64 {
                // Spaces may remain from unfolded continuation lines.
                let cleaned: Vec<u8> = segment.iter().copied().filter(|&b| b != b' ').collect();
                BASE64.decode(&cleaned).unwrap_or_default()
            } else {
                segment.clone()
            }
        })
        .collect()
}

fn apply_birthday(record: &mut ContactRecord, value: &str) {
    let stripped: String = value.chars().filter(|&c| c != '-').collect();
    if let (Some(year), Some(month), Some(day)) =
        (stripped.get(0..4), stripped.get(4..6), stripped.get(6..8))
    {
        record.set(Property::BirthYear, year);
        record.set(Property::BirthMonth, month);
        record.set(Property::BirthDay, day);
    }
}

fn apply_address(record: &mut ContactRecord, line: &ContentLine, text: &[String]) {
    let work = line
        .params
        .get("TYPE")
        .is_some_and(|t| t.eq_ignore_ascii_case("WORK"));
    let fields: [Property; 6] = if work {
        [
            Property::WorkAddress2,
            Property::WorkAddress,
            Property::WorkCity,
            Property::WorkState,
            Property::WorkZipCode,
            Property::WorkCountry,
        ]
    } else {
        [
            Property::HomeAddress2,
            Property::HomeAddress,
            Property::HomeCity,
            Property::HomeState,
            Property::HomeZipCode,
            Property::HomeCountry,
        ]
    };
    // Field 0 is the unused PO-box component.
    for (offset, &property) in fields.iter().enumerate() {
        if let Some(value) = text.get(offset + 1) {
            if !value.is_empty() {
                record.set(property, value.clone());
            }
        }
    }
}

fn apply_extension(record: &mut ContactRecord, name: &str, value: &str) {
    if name.is_empty() || value.is_empty() {
        return;
    }
    match Property::from_name(name) {
        Some(property) => {
            if property.is_numeric() {
                let coerced = value.parse::<i64>().unwrap_or(0);
                record.set(property, coerced.to_string());
            } else {
                record.set(property, value);
            }
        }
        None => record.set_extra(name, value),
    }
}

fn apply_photo(record: &mut ContactRecord, line: &ContentLine, mut values: Vec<Vec<u8>>) {
    let data = if values.is_empty() {
        Vec::new()
    } else {
        values.swap_remove(0)
    };
    if data.is_empty() {
        return;
    }
    let is_url = line.params.get("VALUE").is_some_and(|v| v.eq_ignore_ascii_case("URL"));
    if is_url {
        record.set_photo(PhotoAttachment::Web(
            String::from_utf8_lossy(&data).into_owned(),
        ));
    } else {
        record.set_photo(PhotoAttachment::Binary(data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(vcf: &str) -> ContactRecord {
        let records = decode(vcf.as_bytes(), Charset::Utf8);
        assert_eq!(records.len(), 1);
        records.into_iter().next().unwrap()
    }

    #[test]
    fn minimal_card() {
        let record = decode_one("BEGIN:VCARD\r\nVERSION:2.1\r\nEND:VCARD\r\n");
        assert_eq!(record.get(Property::DisplayName), "");
    }

    #[test]
    fn name_components_split() {
        let record = decode_one("BEGIN:VCARD\r\nVERSION:2.1\r\nN:Lee;Ann;;;\r\nEND:VCARD\r\n");
        assert_eq!(record.get(Property::LastName), "Lee");
        assert_eq!(record.get(Property::FirstName), "Ann");
    }

    #[test]
    fn concatenated_cards_decode_independently() {
        let vcf = "BEGIN:VCARD\r\nVERSION:2.1\r\nFN:One\r\nEND:VCARD\r\n\
                   BEGIN:VCARD\r\nVERSION:2.1\r\nFN:Two\r\nEND:VCARD\r\n";
        let records = decode(vcf.as_bytes(), Charset::Utf8);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get(Property::DisplayName), "One");
        assert_eq!(records[1].get(Property::DisplayName), "Two");
    }

    #[test]
    fn malformed_segment_is_skipped() {
        let vcf = "garbage without begin\r\nEND:VCARD\r\n\
                   BEGIN:VCARD\r\nVERSION:2.1\r\nFN:Good\r\nEND:VCARD\r\n";
        let records = decode(vcf.as_bytes(), Charset::Utf8);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get(Property::DisplayName), "Good");
    }

    #[test]
    fn email_slots_fill_in_order() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nEMAIL;TYPE=INTERNET:a@x.com\r\nEMAIL;TYPE=INTERNET:b@x.com\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.get(Property::PrimaryEmail), "a@x.com");
        assert_eq!(record.get(Property::SecondEmail), "b@x.com");
    }

    #[test]
    fn tel_flags_pick_the_slot() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nTEL;CELL:111\r\nTEL;WORK;VOICE:222\r\nTEL:333\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.get(Property::CellularNumber), "111");
        assert_eq!(record.get(Property::WorkPhone), "222");
        assert_eq!(record.get(Property::HomePhone), "333");
    }

    #[test]
    fn adr_defaults_to_home() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nADR:;Apt 1;Main St 5;Kiel;SH;24103;Germany\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.get(Property::HomeAddress2), "Apt 1");
        assert_eq!(record.get(Property::HomeAddress), "Main St 5");
        assert_eq!(record.get(Property::HomeCity), "Kiel");
        assert_eq!(record.get(Property::HomeState), "SH");
        assert_eq!(record.get(Property::HomeZipCode), "24103");
        assert_eq!(record.get(Property::HomeCountry), "Germany");
    }

    #[test]
    fn adr_work_type_targets_work_fields() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nADR;TYPE=WORK:;;Office Rd 1;;;;\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.get(Property::WorkAddress), "Office Rd 1");
        assert_eq!(record.get(Property::HomeAddress), "");
    }

    #[test]
    fn bday_with_dashes_is_split() {
        let record =
            decode_one("BEGIN:VCARD\r\nVERSION:2.1\r\nBDAY:1984-03-07\r\nEND:VCARD\r\n");
        assert_eq!(record.get(Property::BirthYear), "1984");
        assert_eq!(record.get(Property::BirthMonth), "03");
        assert_eq!(record.get(Property::BirthDay), "07");
    }

    #[test]
    fn quoted_printable_note_decodes() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nNOTE;CHARSET=UTF-8;ENCODING=QUOTED-PRINTABLE:one=0Atwo=20=C3=A4\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.get(Property::Notes), "one\ntwo ä");
    }

    #[test]
    fn qp_soft_breaks_are_unfolded() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nNOTE;ENCODING=QUOTED-PRINTABLE:one=\r\ntwo\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.get(Property::Notes), "onetwo");
    }

    #[test]
    fn base64_note_decodes() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nNOTE;CHARSET=UTF-8;ENCODING=BASE64:YQpi\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.get(Property::Notes), "a\nb");
    }

    #[test]
    fn rev_becomes_epoch_seconds() {
        let record =
            decode_one("BEGIN:VCARD\r\nVERSION:2.1\r\nREV:2011-03-14T12:30:00Z\r\nEND:VCARD\r\n");
        assert_eq!(record.get(Property::LastModifiedDate), "1300105800");
    }

    #[test]
    fn extension_lines_with_numeric_coercion() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\n\
             X-MOZILLA-PROPERTY:NickName;Annie\r\n\
             X-MOZILLA-PROPERTY:PopularityIndex;not-a-number\r\n\
             X-MOZILLA-PROPERTY:SomethingNew;kept\r\n\
             END:VCARD\r\n",
        );
        assert_eq!(record.get(Property::NickName), "Annie");
        assert_eq!(record.get(Property::PopularityIndex), "0");
        assert_eq!(record.get_extra("SomethingNew"), "kept");
    }

    #[test]
    fn messenger_lines_map_to_handles() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nX-JABBER:ann@jabber.org\r\nX-SKYPE:ann.lee\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.get(Property::JabberId), "ann@jabber.org");
        assert_eq!(record.get(Property::Skype), "ann.lee");
    }

    #[test]
    fn photo_url_and_binary() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nPHOTO;VALUE=URL:http://example.com/p.png\r\nEND:VCARD\r\n",
        );
        assert_eq!(
            record.photo(),
            &PhotoAttachment::Web("http://example.com/p.png".to_string())
        );

        // 0xFF 0xD8 JPEG magic, base64 "/9g=".
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nPHOTO;ENCODING=BASE64;TYPE=JPEG:/9g=\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.photo(), &PhotoAttachment::Binary(vec![0xFF, 0xD8]));
    }

    #[test]
    fn folded_base64_photo_reassembles() {
        // Folding leaves a leading space on continuation lines which the
        // Base64 decoder must ignore.
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nPHOTO;ENCODING=BASE64;TYPE=JPEG:/9g\r\n =\r\n\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.photo(), &PhotoAttachment::Binary(vec![0xFF, 0xD8]));
    }

    #[test]
    fn masked_semicolons_are_unescaped() {
        let record =
            decode_one("BEGIN:VCARD\r\nVERSION:2.1\r\nN:Doe\\;Jr;John;;;\r\nEND:VCARD\r\n");
        assert_eq!(record.get(Property::LastName), "Doe;Jr");
        assert_eq!(record.get(Property::FirstName), "John");
    }

    #[test]
    fn latin1_fallback_applies_without_charset_param() {
        let vcf = b"BEGIN:VCARD\r\nVERSION:2.1\r\nN:M\xfcller;;;;\r\nEND:VCARD\r\n";
        let records = decode(vcf, Charset::Standard);
        assert_eq!(records[0].get(Property::LastName), "Müller");
    }

    #[test]
    fn hidden_uid_round_trips_via_extension_line() {
        let record = decode_one(
            "BEGIN:VCARD\r\nVERSION:2.1\r\nX-MOZILLA-PROPERTY:UID;1234\r\nEND:VCARD\r\n",
        );
        assert_eq!(record.uid(), "1234");
    }
}
