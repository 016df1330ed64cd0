//! Enumerations shared between the codec, the engine, and configuration.

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

/// Per-address-book synchronization policy.
///
/// Governs the default resolution direction of every difference found for
/// that book. `Ask` leaves conflicts to interactive resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Synchronization disabled for this book.
    No,
    /// Interactive merge; conflicts must be resolved by the caller.
    Ask,
    /// Local values win; remote-only data is removed.
    Export,
    /// Remote values win; local-only data is removed.
    Import,
}

impl SyncMode {
    /// Parses a preference string, normalizing the legacy
    /// `forced export` / `forced import` spellings.
    #[must_use]
    pub fn from_pref(value: &str) -> Option<Self> {
        match value {
            "no" => Some(Self::No),
            "ask" => Some(Self::Ask),
            "export" | "forced export" => Some(Self::Export),
            "import" | "forced import" => Some(Self::Import),
            _ => None,
        }
    }

    /// Returns the canonical preference string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Ask => "ask",
            Self::Export => "export",
            Self::Import => "import",
        }
    }
}

/// On-disk layout of an external vCard resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceFormat {
    /// A flat directory with one vCard file per contact.
    #[serde(rename = "vCardDir")]
    VCardDir,
    /// A single file holding concatenated `BEGIN:VCARD` blocks.
    #[serde(rename = "vCardFile")]
    VCardFile,
}

/// Per-property override of the address-book sync mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    /// Interactive resolution (the default).
    Ask,
    /// Local value wins for this property.
    Export,
    /// Remote value wins for this property.
    Import,
    /// Never produce a difference entry for this property.
    Ignore,
}

impl FilterAction {
    /// Parses a filter action string as it appears in the filter preference.
    #[must_use]
    pub fn from_pref(value: &str) -> Option<Self> {
        match value {
            "ask" => Some(Self::Ask),
            "export" => Some(Self::Export),
            "import" => Some(Self::Import),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

/// A charset resolved for one direction of transfer: the label written into
/// `CHARSET=` parameters together with the codec implementing it.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedCharset {
    /// Canonical charset name (as emitted on property lines).
    pub label: &'static str,
    encoding: &'static Encoding,
}

impl ResolvedCharset {
    /// Encodes a string, returning `None` when the text cannot be
    /// represented in this charset (caller falls back to UTF-8).
    #[must_use]
    pub fn encode_str(&self, value: &str) -> Option<Vec<u8>> {
        let (bytes, _, had_unmappable) = self.encoding.encode(value);
        if had_unmappable {
            None
        } else {
            Some(bytes.into_owned())
        }
    }

    /// Decodes bytes, substituting replacement characters for invalid
    /// sequences rather than failing.
    #[must_use]
    pub fn decode_bytes(&self, value: &[u8]) -> String {
        let (text, _, _) = self.encoding.decode(value);
        text.into_owned()
    }
}

/// The enumerated charsets an address-book may be configured with.
///
/// `Standard` resolves per direction: UTF-8 on export and ISO-8859-1 on
/// import, matching the historic default of vCard 2.1 producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Charset {
    Standard,
    #[serde(rename = "ISO-8859-1")]
    Iso8859_1,
    #[serde(rename = "ISO-8859-2")]
    Iso8859_2,
    #[serde(rename = "ISO-8859-3")]
    Iso8859_3,
    #[serde(rename = "ISO-8859-4")]
    Iso8859_4,
    #[serde(rename = "ISO-8859-5")]
    Iso8859_5,
    #[serde(rename = "ISO-8859-6")]
    Iso8859_6,
    #[serde(rename = "ISO-8859-7")]
    Iso8859_7,
    #[serde(rename = "ISO-8859-8")]
    Iso8859_8,
    #[serde(rename = "ISO-8859-9")]
    Iso8859_9,
    #[serde(rename = "ISO-8859-10")]
    Iso8859_10,
    #[serde(rename = "ISO-8859-11")]
    Iso8859_11,
    #[serde(rename = "ISO-8859-13")]
    Iso8859_13,
    #[serde(rename = "ISO-8859-14")]
    Iso8859_14,
    #[serde(rename = "ISO-8859-15")]
    Iso8859_15,
    #[serde(rename = "ISO-8859-16")]
    Iso8859_16,
    #[serde(rename = "Windows-874")]
    Windows874,
    #[serde(rename = "Windows-932")]
    Windows932,
    #[serde(rename = "Windows-936")]
    Windows936,
    #[serde(rename = "Windows-949")]
    Windows949,
    #[serde(rename = "Windows-950")]
    Windows950,
    #[serde(rename = "Windows-1250")]
    Windows1250,
    #[serde(rename = "Windows-1251")]
    Windows1251,
    #[serde(rename = "Windows-1252")]
    Windows1252,
    #[serde(rename = "Windows-1253")]
    Windows1253,
    #[serde(rename = "Windows-1254")]
    Windows1254,
    #[serde(rename = "Windows-1255")]
    Windows1255,
    #[serde(rename = "Windows-1256")]
    Windows1256,
    #[serde(rename = "Windows-1257")]
    Windows1257,
    #[serde(rename = "Windows-1258")]
    Windows1258,
    #[serde(rename = "UTF-8")]
    Utf8,
}

/// Legacy preference stores carried free-form charset strings; an unknown
/// name degrades to `Standard` instead of failing deserialization.
impl<'de> Deserialize<'de> for Charset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name).unwrap_or(Self::Standard))
    }
}

impl Charset {
    /// Parses a charset name from the enumerated preference list.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_CHARSETS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, c)| c)
    }

    /// Returns the canonical preference name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        ALL_CHARSETS
            .iter()
            .find(|&&(_, c)| c == self)
            .map_or("UTF-8", |&(n, _)| n)
    }

    /// Resolves the charset for encoding (writing resources).
    #[must_use]
    pub fn export(self) -> ResolvedCharset {
        match self {
            Self::Standard | Self::Utf8 => resolved("UTF-8", encoding_rs::UTF_8),
            other => other.resolved_concrete(),
        }
    }

    /// Resolves the charset for decoding (reading resources).
    #[must_use]
    pub fn import(self) -> ResolvedCharset {
        match self {
            Self::Standard => resolved("ISO-8859-1", encoding_rs::WINDOWS_1252),
            other => other.resolved_concrete(),
        }
    }

    // WHATWG has no distinct codecs for ISO-8859-1/9/11 or the CJK
    // Windows code pages; the superset encodings stand in for them.
    fn resolved_concrete(self) -> ResolvedCharset {
        use encoding_rs as e;
        let (label, encoding): (&'static str, &'static Encoding) = match self {
            Self::Standard | Self::Utf8 => ("UTF-8", e::UTF_8),
            Self::Iso8859_1 => ("ISO-8859-1", e::WINDOWS_1252),
            Self::Iso8859_2 => ("ISO-8859-2", e::ISO_8859_2),
            Self::Iso8859_3 => ("ISO-8859-3", e::ISO_8859_3),
            Self::Iso8859_4 => ("ISO-8859-4", e::ISO_8859_4),
            Self::Iso8859_5 => ("ISO-8859-5", e::ISO_8859_5),
            Self::Iso8859_6 => ("ISO-8859-6", e::ISO_8859_6),
            Self::Iso8859_7 => ("ISO-8859-7", e::ISO_8859_7),
            Self::Iso8859_8 => ("ISO-8859-8", e::ISO_8859_8),
            Self::Iso8859_9 => ("ISO-8859-9", e::WINDOWS_1254),
            Self::Iso8859_10 => ("ISO-8859-10", e::ISO_8859_10),
            Self::Iso8859_11 => ("ISO-8859-11", e::WINDOWS_874),
            Self::Iso8859_13 => ("ISO-8859-13", e::ISO_8859_13),
            Self::Iso8859_14 => ("ISO-8859-14", e::ISO_8859_14),
            Self::Iso8859_15 => ("ISO-8859-15", e::ISO_8859_15),
            Self::Iso8859_16 => ("ISO-8859-16", e::ISO_8859_16),
            Self::Windows874 => ("Windows-874", e::WINDOWS_874),
            Self::Windows932 => ("Windows-932", e::SHIFT_JIS),
            Self::Windows936 => ("Windows-936", e::GBK),
            Self::Windows949 => ("Windows-949", e::EUC_KR),
            Self::Windows950 => ("Windows-950", e::BIG5),
            Self::Windows1250 => ("Windows-1250", e::WINDOWS_1250),
            Self::Windows1251 => ("Windows-1251", e::WINDOWS_1251),
            Self::Windows1252 => ("Windows-1252", e::WINDOWS_1252),
            Self::Windows1253 => ("Windows-1253", e::WINDOWS_1253),
            Self::Windows1254 => ("Windows-1254", e::WINDOWS_1254),
            Self::Windows1255 => ("Windows-1255", e::WINDOWS_1255),
            Self::Windows1256 => ("Windows-1256", e::WINDOWS_1256),
            Self::Windows1257 => ("Windows-1257", e::WINDOWS_1257),
            Self::Windows1258 => ("Windows-1258", e::WINDOWS_1258),
        };
        resolved(label, encoding)
    }
}

const fn resolved(label: &'static str, encoding: &'static Encoding) -> ResolvedCharset {
    ResolvedCharset { label, encoding }
}

const ALL_CHARSETS: &[(&str, Charset)] = &[
    ("Standard", Charset::Standard),
    ("ISO-8859-1", Charset::Iso8859_1),
    ("ISO-8859-2", Charset::Iso8859_2),
    ("ISO-8859-3", Charset::Iso8859_3),
    ("ISO-8859-4", Charset::Iso8859_4),
    ("ISO-8859-5", Charset::Iso8859_5),
    ("ISO-8859-6", Charset::Iso8859_6),
    ("ISO-8859-7", Charset::Iso8859_7),
    ("ISO-8859-8", Charset::Iso8859_8),
    ("ISO-8859-9", Charset::Iso8859_9),
    ("ISO-8859-10", Charset::Iso8859_10),
    ("ISO-8859-11", Charset::Iso8859_11),
    ("ISO-8859-13", Charset::Iso8859_13),
    ("ISO-8859-14", Charset::Iso8859_14),
    ("ISO-8859-15", Charset::Iso8859_15),
    ("ISO-8859-16", Charset::Iso8859_16),
    ("Windows-874", Charset::Windows874),
    ("Windows-932", Charset::Windows932),
    ("Windows-936", Charset::Windows936),
    ("Windows-949", Charset::Windows949),
    ("Windows-950", Charset::Windows950),
    ("Windows-1250", Charset::Windows1250),
    ("Windows-1251", Charset::Windows1251),
    ("Windows-1252", Charset::Windows1252),
    ("Windows-1253", Charset::Windows1253),
    ("Windows-1254", Charset::Windows1254),
    ("Windows-1255", Charset::Windows1255),
    ("Windows-1256", Charset::Windows1256),
    ("Windows-1257", Charset::Windows1257),
    ("Windows-1258", Charset::Windows1258),
    ("UTF-8", Charset::Utf8),
];
