//! vCard parse error types.

use std::fmt;

/// Result type for vCard parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// An error that occurred while decoding a vCard segment.
///
/// Segment-level errors are not fatal to a batch decode; the caller logs
/// them and skips the segment.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// Line number where the error occurred (1-based, within the segment).
    pub line: usize,
    /// Additional context or message.
    pub message: String,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(kind: ParseErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            message: message.into(),
        }
    }

    /// Creates a missing-envelope error (no `BEGIN:VCARD` / `END:VCARD`).
    #[must_use]
    pub fn missing_envelope(line: usize) -> Self {
        Self::new(
            ParseErrorKind::MissingEnvelope,
            line,
            "segment lacks BEGIN:VCARD / END:VCARD markers",
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.kind, self.message)
    }
}

impl std::error::Error for ParseError {}

/// The kind of parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The segment is not wrapped in `BEGIN:VCARD` / `END:VCARD`.
    MissingEnvelope,
    /// A content line has no colon separator.
    MissingColon,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEnvelope => write!(f, "missing vCard envelope"),
            Self::MissingColon => write!(f, "missing colon separator"),
        }
    }
}
