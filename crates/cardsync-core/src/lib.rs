//! Shared types for cardsync: the contact data model, per-address-book
//! preferences, and the small enums the codec and engine agree on.

pub mod config;
pub mod contact;
pub mod error;
pub mod types;

pub use contact::{ContactRecord, PhotoAttachment, Property};
pub use error::{CoreError, CoreResult};
pub use types::{Charset, FilterAction, ResourceFormat, SyncMode};
