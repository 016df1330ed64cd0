//! vCard 2.1 codec.
//!
//! Encodes a [`cardsync_core::ContactRecord`] to a vCard 2.1 byte stream and
//! decodes a stream of one or more concatenated vCards back into records.
//! The codec owns line folding, the quoted-printable and Base64
//! sub-encodings, charset conversion, and photo format sniffing.
//!
//! The structure of a vCard (line breaks, colons, semicolons, parameter
//! names) is plain ASCII, so parsing operates on bytes; charset conversion
//! is applied to value segments only, after the sub-encodings have been
//! reversed, and never to `PHOTO` data.

pub mod build;
pub mod parse;
pub mod photo;

pub use build::encoder::{EncodeError, EncodeOptions, NoPhotos, PhotoSource, encode};
pub use parse::decoder::{decode, decode_single};
pub use parse::error::{ParseError, ParseErrorKind, ParseResult};

/// Default file suffix for vCard resources.
pub const FILE_SUFFIX: &str = "vcf";
