//! Byte-level content-line lexing.
//!
//! A content line is `NAME;PARAM;KEY=VALUE:value;value;...`. The structural
//! characters are ASCII, so the lexer works on raw bytes and leaves value
//! segments unconverted; the decoder applies sub-encoding reversal and
//! charset conversion afterwards.

use std::collections::{BTreeMap, BTreeSet};

use super::error::{ParseError, ParseErrorKind, ParseResult};

/// Parameters of one content line.
///
/// `KEY=VALUE` pairs populate the value map; bare parameters (and the value
/// side of each pair, as vCard 2.1 writers use both `TEL;CELL` and
/// `TEL;TYPE=CELL`) populate the flag set. Keys and flags are uppercased.
#[derive(Debug, Default)]
pub struct Params {
    values: BTreeMap<String, String>,
    flags: BTreeSet<String>,
}

impl Params {
    /// Returns the value of a `KEY=VALUE` parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns whether a bare flag (or pair value) is present.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }
}

/// One lexed content line: uppercased property name, parameters, and the
/// raw value segments split at unescaped semicolons.
#[derive(Debug)]
pub struct ContentLine {
    pub name: String,
    pub params: Params,
    pub values: Vec<Vec<u8>>,
    pub line: usize,
}

impl ContentLine {
    /// Returns the raw bytes of value segment `index`, or `b""`.
    #[must_use]
    pub fn value(&self, index: usize) -> &[u8] {
        self.values.get(index).map_or(&[], Vec::as_slice)
    }
}

/// Removes the soft line breaks of a vCard body.
///
/// Quoted-printable continuations (`=` CRLF) are deleted; folding
/// continuations (CRLF followed by space or tab) keep the whitespace
/// character, which is part of the folded value.
#[must_use]
pub fn unfold(body: &[u8]) -> Vec<u8> {
    // Quoted-printable soft breaks first, matching the order the breaks
    // were introduced on the encode side.
    let mut qp_stripped = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        if body[i] == b'='
            && body.get(i + 1) == Some(&b'\r')
            && body.get(i + 2) == Some(&b'\n')
            && body
                .get(i + 3)
                .is_some_and(|&b| b != b'\r' && b != b'\n')
        {
            i += 3;
        } else {
            qp_stripped.push(body[i]);
            i += 1;
        }
    }

    let mut out = Vec::with_capacity(qp_stripped.len());
    let mut i = 0;
    while i < qp_stripped.len() {
        if qp_stripped[i] == b'\r'
            && qp_stripped.get(i + 1) == Some(&b'\n')
            && qp_stripped
                .get(i + 2)
                .is_some_and(|&b| b == b' ' || b == b'\t')
        {
            out.push(qp_stripped[i + 2]);
            i += 3;
        } else {
            out.push(qp_stripped[i]);
            i += 1;
        }
    }
    out
}

/// Splits a body into CRLF-delimited lines. Lone `\n` separators are
/// tolerated for resources written by unix tools.
#[must_use]
pub fn split_crlf(body: &[u8]) -> Vec<&[u8]> {
    body.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect()
}

/// Lexes one content line.
///
/// ## Errors
/// Returns an error if the line has no colon separator.
pub fn split_content_line(raw: &[u8], line: usize) -> ParseResult<ContentLine> {
    let colon = raw
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingColon, line, "no ':' in line"))?;

    let head = String::from_utf8_lossy(&raw[..colon]);
    let mut parts = head.split(';');
    let name = parts.next().unwrap_or("").trim().to_ascii_uppercase();

    let mut params = Params::default();
    for part in parts {
        match part.split_once('=') {
            Some((key, value)) => {
                params.flags.insert(value.trim().to_ascii_uppercase());
                params
                    .values
                    .insert(key.trim().to_ascii_uppercase(), value.trim().to_string());
            }
            None => {
                params.flags.insert(part.trim().to_ascii_uppercase());
            }
        }
    }

    Ok(ContentLine {
        name,
        params,
        values: split_segments(&raw[colon + 1..]),
        line,
    })
}

/// Splits a value portion at unescaped semicolons; `\;` stays inside its
/// segment for later un-escaping.
fn split_segments(value: &[u8]) -> Vec<Vec<u8>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    let mut escaped = false;
    for &b in value {
        if escaped {
            current.push(b);
            escaped = false;
        } else if b == b'\\' {
            current.push(b);
            escaped = true;
        } else if b == b';' {
            segments.push(std::mem::take(&mut current));
        } else {
            current.push(b);
        }
    }
    segments.push(current);
    segments
}

/// Reverses the value escapes `\;`, `\,` and `\\`.
#[must_use]
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            if !matches!(c, ';' | ',' | '\\') {
                out.push('\\');
            }
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    if escaped {
        out.push('\\');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfold_keeps_folding_whitespace() {
        assert_eq!(unfold(b"NOTE:one \r\ntwo"), b"NOTE:one \r\ntwo");
        assert_eq!(unfold(b"NOTE:one\r\n two"), b"NOTE:one two");
        assert_eq!(unfold(b"NOTE:one\r\n\ttwo"), b"NOTE:one\ttwo");
    }

    #[test]
    fn unfold_removes_qp_soft_breaks() {
        assert_eq!(unfold(b"NOTE:a=C3=\r\nA4b"), b"NOTE:a=C3=A4b");
        // A trailing "=" CRLF pair at end of input is not a soft break.
        assert_eq!(unfold(b"NOTE:a=\r\n"), b"NOTE:a=\r\n");
    }

    #[test]
    fn lexes_name_params_values() {
        let line = split_content_line(b"ADR;TYPE=HOME;CHARSET=UTF-8:;a;b;c;d;e;f", 1).unwrap();
        assert_eq!(line.name, "ADR");
        assert_eq!(line.params.get("TYPE"), Some("HOME"));
        assert!(line.params.flag("HOME"));
        assert_eq!(line.values.len(), 7);
        assert_eq!(line.value(1), b"a");
        assert_eq!(line.value(6), b"f");
    }

    #[test]
    fn bare_flags_are_recognized() {
        let line = split_content_line(b"TEL;CELL:+49 1234", 1).unwrap();
        assert_eq!(line.name, "TEL");
        assert!(line.params.flag("CELL"));
        assert_eq!(line.value(0), b"+49 1234");
    }

    #[test]
    fn masked_semicolons_stay_in_segment() {
        let line = split_content_line(b"N;CHARSET=UTF-8:Doe\\;Jr;John;;;", 1).unwrap();
        assert_eq!(line.value(0), b"Doe\\;Jr");
        assert_eq!(unescape("Doe\\;Jr"), "Doe;Jr");
    }

    #[test]
    fn line_without_colon_is_an_error() {
        let err = split_content_line(b"BROKEN LINE", 3).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingColon);
        assert_eq!(err.line, 3);
    }

    #[test]
    fn unescape_passes_unknown_escapes_through() {
        assert_eq!(unescape("a\\;b\\,c\\\\d"), "a;b,c\\d");
        assert_eq!(unescape("a\\nb"), "a\\nb");
    }
}
