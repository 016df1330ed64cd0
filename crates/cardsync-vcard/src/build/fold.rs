//! vCard 2.1 line folding.
//!
//! Three folding schemes exist, one per value encoding. Plain text folds at
//! word boundaries with the whitespace character opening the continuation
//! line; Base64 folds with a CRLF-space continuation; quoted-printable folds
//! with a trailing `=` soft break. The `offset` arguments carry the length
//! of the property-name prefix already on the first line.

/// Whitespace bytes accepted as text fold points.
const FOLD_BYTES: &[u8] = b"\x0C\n\t\x0B ";

/// Folds a plain-text line at word boundaries so no physical line exceeds
/// 76 octets. The whitespace byte moves to the start of the continuation
/// line, where it doubles as the continuation marker. A line without a
/// usable fold point is left long rather than broken mid-word.
#[must_use]
pub fn fold_text(line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len() + 8);
    let mut rest = line;
    while rest.len() > 76 {
        let Some(pos) = rest[..=75].iter().rposition(|b| FOLD_BYTES.contains(b)) else {
            break;
        };
        if pos == 0 {
            break;
        }
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(b"\r\n");
        rest = &rest[pos..];
    }
    out.extend_from_slice(rest);
    out
}

/// Folds Base64 data with CRLF-space continuations: the first chunk fills
/// the line up to 76 octets including the prefix, continuation lines hold
/// 75 octets after the marker space.
#[must_use]
pub fn fold_base64(data: &str, offset: usize) -> String {
    fold_chunks(data, 76_usize.saturating_sub(offset).max(1), 75, "\r\n ")
}

/// Folds quoted-printable data with `=` CRLF soft breaks at 75 octets.
#[must_use]
pub fn fold_qp(data: &str, offset: usize) -> String {
    fold_chunks(data, 75_usize.saturating_sub(offset).max(1), 75, "=\r\n")
}

fn fold_chunks(data: &str, first: usize, rest: usize, separator: &str) -> String {
    let mut out = String::with_capacity(data.len() + data.len() / rest * separator.len() + 4);
    let mut remaining = data;
    let mut width = first;
    while !remaining.is_empty() {
        let take = width.min(remaining.len());
        out.push_str(&remaining[..take]);
        remaining = &remaining[take..];
        if !remaining.is_empty() {
            out.push_str(separator);
        }
        width = rest;
    }
    out
}
