use std::fs;
use std::path::{Path, PathBuf};

use cardsync_core::config::{BookPrefs, SyncTrigger, load_config};
use cardsync_core::SyncMode;
use cardsync_engine::{EngineError, FsPhotoStore, MemoryContactStore, SyncSession};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting cardsync");

    let config = load_config()?;

    tracing::info!(config = ?config, "Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    let photo_dir = config
        .photos
        .dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("photos"));
    fs::create_dir_all(&photo_dir)?;

    for book in &config.addressbooks {
        if let Err(error) = run_book(book, &photo_dir) {
            tracing::error!(book = %book.name, %error, "synchronization failed");
        }
    }

    Ok(())
}

/// Runs one synchronization session for one configured address-book.
///
/// The local side is a JSON snapshot file; it is loaded before the session
/// and written back afterwards so repeated runs see their own changes.
fn run_book(book: &BookPrefs, photo_dir: &Path) -> anyhow::Result<()> {
    let mode = book.mode_for(SyncTrigger::Manual)?;
    if mode == SyncMode::No {
        tracing::info!(book = %book.name, "synchronization disabled");
        return Ok(());
    }

    let mut contacts = load_snapshot(book)?;
    let mut photos = FsPhotoStore::new(photo_dir.to_path_buf());

    let mut session = SyncSession::new(book.clone(), mode, &mut contacts, &mut photos)?;
    match session.run_auto() {
        Ok(report) => {
            tracing::info!(book = %book.name, report = ?report, "synchronization complete");
            save_snapshot(book, &contacts)?;
        }
        Err(EngineError::Unresolved) => {
            tracing::warn!(
                book = %book.name,
                "plan has unresolved differences, nothing was changed; \
                 set the sync mode to export or import to resolve automatically"
            );
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}

fn load_snapshot(book: &BookPrefs) -> anyhow::Result<MemoryContactStore> {
    let Some(path) = &book.local_snapshot else {
        return Ok(MemoryContactStore::new(book.name.clone(), book.name.clone()));
    };
    if !path.is_file() {
        return Ok(MemoryContactStore::new(book.name.clone(), book.name.clone()));
    }
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

fn save_snapshot(book: &BookPrefs, contacts: &MemoryContactStore) -> anyhow::Result<()> {
    if let Some(path) = &book.local_snapshot {
        fs::write(path, serde_json::to_vec_pretty(contacts)?)?;
    }
    Ok(())
}
