use thiserror::Error;

/// Engine error type.
///
/// Configuration errors abort a session before any mutation; everything
/// else inside a session degrades to "treat as absent" and is logged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("address-book {0}: no resource path configured")]
    NotConfigured(String),

    #[error("merge plan still contains unresolved conflicts")]
    Unresolved,

    #[error(transparent)]
    Core(#[from] cardsync_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
