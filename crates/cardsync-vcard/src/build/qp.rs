//! Quoted-printable sub-encoding.
//!
//! This is the vCard 2.1 variant, not MIME: bytes outside the printable
//! ASCII range and the equals sign itself become `=XX`; everything else is
//! copied verbatim. Soft line breaks are the folder's job.

/// Encodes bytes as quoted-printable.
#[must_use]
pub fn encode_qp(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        if !(32..=126).contains(&b) || b == b'=' {
            out.push_str(&format!("={b:02X}"));
        } else {
            out.push(char::from(b));
        }
    }
    out
}

/// Decodes quoted-printable bytes. Assumes soft line breaks were already
/// removed by unfolding; a `=` not followed by two hex digits is copied
/// verbatim.
#[must_use]
pub fn decode_qp(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'=' && i + 2 < data.len() {
            let hex = [data[i + 1], data[i + 2]];
            if let (Some(hi), Some(lo)) = (hex_digit(hex[0]), hex_digit(hex[1])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(data[i]);
        i += 1;
    }
    out
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}
