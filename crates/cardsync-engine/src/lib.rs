//! Contact synchronization between a local address-book store and
//! external vCard 2.1 resources.
//!
//! The pieces compose into a [`SyncSession`]: [`resource`] loads the
//! external files into a positional [`ResourceStore`], [`matcher`] pairs
//! remote records with local ones, [`diff`] computes per-property
//! differences under the book's filter and sync mode, and the session
//! applies the resolved plan and writes modified resources back.

pub mod diff;
pub mod error;
pub mod local;
pub mod matcher;
pub mod resource;
pub mod session;
pub mod store;

pub use diff::{ContactState, DiffProperty, DifferenceEntry, Resolution};
pub use error::{EngineError, EngineResult};
pub use local::{ContactStore, FsPhotoStore, MemoryContactStore, MemoryPhotoStore, PhotoStore};
pub use matcher::{MATCH_THRESHOLD, match_contact};
pub use session::{MergePlan, PlanItem, RemoteRef, SessionState, SyncReport, SyncSession};
pub use store::ResourceStore;
