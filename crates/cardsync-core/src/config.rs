use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::types::{Charset, FilterAction, ResourceFormat, SyncMode};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
    #[serde(default)]
    pub photos: PhotoConfig,
    #[serde(default)]
    pub addressbooks: Vec<BookPrefs>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhotoConfig {
    /// Managed photo directory; photo file references resolve against it.
    pub dir: Option<PathBuf>,
}

/// The moment a synchronization run is triggered, selecting which of the
/// three per-book mode preferences applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Startup,
    Shutdown,
    Manual,
}

/// Per-address-book preferences.
///
/// Mirrors the preference branches of the original store: resource path and
/// format, charsets for each direction, the three codec flags, the filter
/// string, and one sync-mode string per trigger.
#[derive(Debug, Clone, Deserialize)]
pub struct BookPrefs {
    /// Stable address-book identifier.
    pub name: String,
    /// Path to the external vCard resource. Empty means not configured.
    #[serde(default)]
    pub path: String,
    /// Snapshot file backing the local side of this book.
    #[serde(default)]
    pub local_snapshot: Option<PathBuf>,
    #[serde(default = "default_format")]
    pub format: ResourceFormat,
    #[serde(default = "default_charset")]
    pub export_encoding: Charset,
    #[serde(default = "default_charset")]
    pub import_encoding: Charset,
    /// Mirror the UID into an `X-MOZILLA-PROPERTY` line on export.
    #[serde(default)]
    pub hide_uid: bool,
    /// Prefer quoted-printable over Base64 for multi-line values.
    #[serde(default = "default_true")]
    pub quoted_printable: bool,
    /// Fold long property lines.
    #[serde(default = "default_true")]
    pub folding: bool,
    /// Comma-separated `name=action` per-property filter overrides.
    #[serde(default)]
    pub filter: String,
    /// Sync mode for manual runs. Raw string; normalized by [`Self::migrate`].
    #[serde(default = "default_ask")]
    pub sync_mode: String,
    /// Sync mode applied at application startup.
    #[serde(default = "default_no")]
    pub startup: String,
    /// Sync mode applied at application shutdown.
    #[serde(default = "default_no")]
    pub shutdown: String,
}

fn default_format() -> ResourceFormat {
    ResourceFormat::VCardDir
}

fn default_charset() -> Charset {
    Charset::Standard
}

fn default_true() -> bool {
    true
}

fn default_ask() -> String {
    "ask".to_string()
}

fn default_no() -> String {
    "no".to_string()
}

impl BookPrefs {
    /// One-time migration pass over raw preference strings.
    ///
    /// Legacy `forced export`/`forced import` become `export`/`import`,
    /// and the startup/shutdown triggers accept the even older boolean
    /// spelling (`true` meant "ask on this trigger"). Anything
    /// unrecognized falls back to `ask` for the manual mode and `no` for
    /// the triggers.
    pub fn migrate(&mut self) {
        self.sync_mode = SyncMode::from_pref(&self.sync_mode)
            .unwrap_or(SyncMode::Ask)
            .as_str()
            .to_string();
        for raw in [&mut self.startup, &mut self.shutdown] {
            let mode = match raw.as_str() {
                "true" => SyncMode::Ask,
                "false" => SyncMode::No,
                other => SyncMode::from_pref(other).unwrap_or(SyncMode::No),
            };
            *raw = mode.as_str().to_string();
        }
    }

    /// Returns the sync mode for the given trigger.
    ///
    /// ## Errors
    /// Returns an error if the preference string is invalid, which means
    /// [`Self::migrate`] was not run; the session aborts before mutation.
    pub fn mode_for(&self, trigger: SyncTrigger) -> CoreResult<SyncMode> {
        let raw = match trigger {
            SyncTrigger::Startup => &self.startup,
            SyncTrigger::Shutdown => &self.shutdown,
            SyncTrigger::Manual => &self.sync_mode,
        };
        SyncMode::from_pref(raw).ok_or_else(|| {
            CoreError::InvalidConfiguration(format!(
                "address-book {}: invalid sync mode {raw:?}",
                self.name
            ))
        })
    }

    /// Parses the filter preference string into a [`FilterPolicy`].
    ///
    /// Malformed entries are skipped, matching the lenient reading of the
    /// original preference store.
    #[must_use]
    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy::parse(&self.filter)
    }
}

/// Per-property filter overrides for one address-book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    actions: BTreeMap<String, FilterAction>,
}

impl FilterPolicy {
    /// Parses a comma-separated `name=action` string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut actions = BTreeMap::new();
        for entry in raw.split(',') {
            let Some((name, action)) = entry.split_once('=') else {
                continue;
            };
            let Some(action) = FilterAction::from_pref(action.trim()) else {
                continue;
            };
            actions.insert(name.trim().to_string(), action);
        }
        Self { actions }
    }

    /// Returns the override for a property name, if any.
    #[must_use]
    pub fn action(&self, property: &str) -> Option<FilterAction> {
        self.actions.get(property).copied()
    }

    /// Sets an override (used by tests and preference editing).
    pub fn set(&mut self, property: impl Into<String>, action: FilterAction) {
        self.actions.insert(property.into(), action);
    }
}

impl Settings {
    /// ## Summary
    /// Loads configuration from environment variables and an optional
    /// `cardsync.toml` into a `Settings`. Environment variables take
    /// precedence over file values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it
    /// fails.
    pub fn load() -> Result<Self> {
        let mut settings = Config::builder()
            .set_default("logging.level", "info")?
            .add_source(
                config::Environment::default()
                    .prefix("CARDSYNC")
                    .convert_case(config::Case::Snake)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .add_source(config::File::with_name("cardsync.toml").required(false))
            .build()?
            .try_deserialize::<Self>()?;
        for book in &mut settings.addressbooks {
            book.migrate();
        }
        Ok(settings)
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs() -> BookPrefs {
        BookPrefs {
            name: "personal".to_string(),
            path: "/tmp/contacts".to_string(),
            local_snapshot: None,
            format: ResourceFormat::VCardDir,
            export_encoding: Charset::Standard,
            import_encoding: Charset::Standard,
            hide_uid: false,
            quoted_printable: true,
            folding: true,
            filter: String::new(),
            sync_mode: "ask".to_string(),
            startup: "no".to_string(),
            shutdown: "no".to_string(),
        }
    }

    #[test]
    fn migrate_normalizes_legacy_modes() {
        let mut p = prefs();
        p.sync_mode = "forced export".to_string();
        p.startup = "maybe".to_string();
        p.migrate();
        assert_eq!(p.sync_mode, "export");
        assert_eq!(p.startup, "no");
        assert_eq!(p.mode_for(SyncTrigger::Manual).unwrap(), SyncMode::Export);
    }

    #[test]
    fn migrate_maps_legacy_boolean_triggers() {
        let mut p = prefs();
        p.startup = "true".to_string();
        p.shutdown = "false".to_string();
        p.migrate();
        assert_eq!(p.startup, "ask");
        assert_eq!(p.shutdown, "no");
        assert_eq!(p.mode_for(SyncTrigger::Startup).unwrap(), SyncMode::Ask);
        assert_eq!(p.mode_for(SyncTrigger::Shutdown).unwrap(), SyncMode::No);
    }

    #[test]
    fn filter_policy_parses_and_skips_garbage() {
        let policy = FilterPolicy::parse("Notes=ignore,HomePhone=export,bogus,X=dance");
        assert_eq!(policy.action("Notes"), Some(FilterAction::Ignore));
        assert_eq!(policy.action("HomePhone"), Some(FilterAction::Export));
        assert_eq!(policy.action("X"), None);
        assert_eq!(policy.action("FirstName"), None);
    }
}
