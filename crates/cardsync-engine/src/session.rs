//! One synchronization run for one address-book.
//!
//! A session walks a fixed sequence: load the external resources, match
//! them against the local store, compute per-property differences, wait
//! for any interactive resolutions, apply the merges, then write modified
//! resources back. Each phase is a separate call so a front-end can
//! present the plan between `prepare` and `apply`; `run_auto` chains them
//! for the directional modes.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use cardsync_core::config::{BookPrefs, FilterPolicy};
use cardsync_core::{
    Charset, ContactRecord, CoreError, PhotoAttachment, Property, ResourceFormat, SyncMode,
};
use cardsync_vcard::{EncodeError, EncodeOptions, FILE_SUFFIX, PhotoSource, encode, photo};
use serde::{Deserialize, Serialize};

use crate::diff::{
    ContactState, DiffProperty, DifferenceEntry, Resolution, contact_state, diff,
};
use crate::error::{EngineError, EngineResult};
use crate::local::{ContactStore, PhotoStore, random_numerals};
use crate::matcher::match_contact;
use crate::resource::load_resources;
use crate::store::ResourceStore;

/// Session phase. Phases advance strictly forward; calling a phase method
/// out of order is an invariant violation, not a recoverable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Matching,
    Diffing,
    AwaitingResolution,
    Applying,
    WritingBack,
    Done,
}

/// Positional address of a remote record within the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    pub path: PathBuf,
    pub index: usize,
}

/// One contact-level unit of the merge plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlanItem {
    /// A matched local/remote pair with its property differences.
    Matched {
        local_uid: String,
        remote: RemoteRef,
        label: String,
        entries: Vec<DifferenceEntry>,
    },
    /// A remote record with no local counterpart. Imported unless the
    /// export mode marks it for deletion.
    RemoteOnly {
        remote: RemoteRef,
        label: String,
        pending_deletion: bool,
    },
    /// A local record with no remote counterpart. Exported unless the
    /// import mode marks it for deletion.
    LocalOnly {
        local_uid: String,
        label: String,
        pending_deletion: bool,
    },
}

impl PlanItem {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Matched { label, .. }
            | Self::RemoteOnly { label, .. }
            | Self::LocalOnly { label, .. } => label,
        }
    }
}

/// The full merge plan of one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergePlan {
    pub items: Vec<PlanItem>,
}

impl MergePlan {
    /// Whether every difference carries a directional resolution.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.items.iter().all(|item| match item {
            PlanItem::Matched { entries, .. } => {
                contact_state(entries) != ContactState::Unequal
            }
            PlanItem::RemoteOnly { .. } | PlanItem::LocalOnly { .. } => true,
        })
    }

    /// Cycles the resolution of one difference entry.
    pub fn cycle(&mut self, item: usize, entry: usize) {
        if let Some(PlanItem::Matched { entries, .. }) = self.items.get_mut(item) {
            if let Some(e) = entries.get_mut(entry) {
                e.cycle();
            }
        }
    }
}

/// Counters reported after a completed session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Matched pairs with at least one applied difference.
    pub exchanged: usize,
    /// Remote records added to the local store.
    pub imported: usize,
    /// Local records added to the external resource.
    pub exported: usize,
    /// Local records deleted.
    pub deleted_local: usize,
    /// Remote records deleted.
    pub deleted_remote: usize,
    /// Resource files written.
    pub files_written: usize,
    /// Resource files deleted because they held no surviving record.
    pub files_deleted: usize,
}

pub struct SyncSession<'a> {
    prefs: BookPrefs,
    mode: SyncMode,
    policy: FilterPolicy,
    contacts: &'a mut dyn ContactStore,
    photos: &'a mut dyn PhotoStore,
    resources: ResourceStore,
    plan: MergePlan,
    state: SessionState,
    report: SyncReport,
}

impl<'a> SyncSession<'a> {
    /// Builds a session over a configured address-book.
    ///
    /// ## Errors
    /// Returns an error if the book has no resource path configured; the
    /// session refuses to start rather than treat an empty path as an
    /// empty resource.
    pub fn new(
        prefs: BookPrefs,
        mode: SyncMode,
        contacts: &'a mut dyn ContactStore,
        photos: &'a mut dyn PhotoStore,
    ) -> EngineResult<Self> {
        if prefs.path.is_empty() {
            return Err(EngineError::NotConfigured(prefs.name));
        }
        let policy = prefs.filter_policy();
        Ok(Self {
            prefs,
            mode,
            policy,
            contacts,
            photos,
            resources: ResourceStore::new(),
            plan: MergePlan::default(),
            state: SessionState::Idle,
            report: SyncReport::default(),
        })
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn plan(&self) -> &MergePlan {
        &self.plan
    }

    #[must_use]
    pub fn plan_mut(&mut self) -> &mut MergePlan {
        &mut self.plan
    }

    /// Loads resources, matches contacts and computes the merge plan.
    ///
    /// ## Errors
    /// Returns an error when called out of phase.
    pub fn prepare(&mut self) -> EngineResult<&MergePlan> {
        self.expect_state(SessionState::Idle)?;
        if self.mode == SyncMode::No {
            self.state = SessionState::Done;
            return Ok(&self.plan);
        }

        self.state = SessionState::Loading;
        self.mint_local_uids();
        let path = PathBuf::from(&self.prefs.path);
        load_resources(
            &mut self.resources,
            &self.prefs.name,
            &path,
            self.prefs.format,
            self.prefs.import_encoding,
        );

        self.state = SessionState::Matching;
        let locals = self.contacts.records();
        let mut claimed = BTreeSet::new();
        let remote_refs: Vec<RemoteRef> = self
            .resources
            .iter_book(&self.prefs.name)
            .map(|(p, i, _)| RemoteRef {
                path: p.to_path_buf(),
                index: i,
            })
            .collect();

        self.state = SessionState::Diffing;
        let photos: &dyn PhotoSource = &*self.photos;
        for remote_ref in remote_refs {
            let Some(remote) = self
                .resources
                .get(&self.prefs.name, &remote_ref.path, remote_ref.index)
            else {
                continue;
            };
            match match_contact(remote, &locals, &claimed) {
                Some(local) => {
                    claimed.insert(local.uid().to_string());
                    let entries = diff(local, remote, &self.policy, self.mode, photos);
                    self.plan.items.push(PlanItem::Matched {
                        local_uid: local.uid().to_string(),
                        remote: remote_ref,
                        label: local.display_label(),
                        entries,
                    });
                }
                None => self.plan.items.push(PlanItem::RemoteOnly {
                    label: remote.display_label(),
                    remote: remote_ref,
                    pending_deletion: self.mode == SyncMode::Export,
                }),
            }
        }
        for local in &locals {
            if !claimed.contains(local.uid()) {
                self.plan.items.push(PlanItem::LocalOnly {
                    local_uid: local.uid().to_string(),
                    label: local.display_label(),
                    pending_deletion: self.mode == SyncMode::Import,
                });
            }
        }

        self.state = SessionState::AwaitingResolution;
        tracing::debug!(
            book = %self.prefs.name,
            items = self.plan.items.len(),
            resolved = self.plan.is_resolved(),
            "merge plan prepared"
        );
        Ok(&self.plan)
    }

    /// Applies the resolved plan to the local store and the resource
    /// cache. Nothing is written to disk yet.
    ///
    /// ## Errors
    /// Returns [`EngineError::Unresolved`] while any difference is still
    /// interactive, or an error when a photo conversion fails.
    pub fn apply(&mut self) -> EngineResult<()> {
        self.expect_state(SessionState::AwaitingResolution)?;
        if !self.plan.is_resolved() {
            return Err(EngineError::Unresolved);
        }
        self.state = SessionState::Applying;

        let items = std::mem::take(&mut self.plan.items);
        for item in &items {
            match item {
                PlanItem::Matched {
                    local_uid,
                    remote,
                    entries,
                    ..
                } => self.apply_matched(local_uid, remote, entries)?,
                PlanItem::RemoteOnly {
                    remote,
                    pending_deletion,
                    ..
                } => {
                    if *pending_deletion {
                        self.resources
                            .remove(&self.prefs.name, &remote.path, remote.index);
                        self.report.deleted_remote += 1;
                    } else {
                        self.import_remote(remote)?;
                    }
                }
                PlanItem::LocalOnly {
                    local_uid,
                    pending_deletion,
                    ..
                } => {
                    if *pending_deletion {
                        self.delete_local(local_uid)?;
                    } else {
                        self.export_local(local_uid);
                    }
                }
            }
        }
        self.plan.items = items;

        self.state = SessionState::WritingBack;
        Ok(())
    }

    /// Writes every modified resource back to disk.
    ///
    /// A resource with no surviving record is deleted. A charset that
    /// cannot represent some value triggers one retry of the whole
    /// resource with UTF-8; if that also fails the file is left untouched
    /// and the failure logged.
    ///
    /// ## Errors
    /// Returns an error when called out of phase or when a write fails.
    pub fn write_back(&mut self) -> EngineResult<SyncReport> {
        self.expect_state(SessionState::WritingBack)?;
        for (book, path) in self.resources.modified() {
            if book != self.prefs.name {
                continue;
            }
            let surviving = self.resources.surviving(&book, &path);
            if surviving.is_empty() {
                if path.is_file() {
                    fs::remove_file(&path)?;
                    self.report.files_deleted += 1;
                    tracing::info!(path = %path.display(), "removed empty resource");
                }
            } else {
                match self.encode_resource(&surviving, self.prefs.export_encoding) {
                    Ok(data) => {
                        fs::write(&path, data)?;
                        self.report.files_written += 1;
                    }
                    Err(error) => {
                        tracing::warn!(
                            path = %path.display(),
                            %error,
                            "charset cannot represent resource, retrying with UTF-8"
                        );
                        match self.encode_resource(&surviving, Charset::Utf8) {
                            Ok(data) => {
                                fs::write(&path, data)?;
                                self.report.files_written += 1;
                            }
                            Err(error) => {
                                tracing::warn!(
                                    path = %path.display(),
                                    %error,
                                    "resource left unwritten"
                                );
                            }
                        }
                    }
                }
            }
        }
        self.state = SessionState::Done;
        tracing::info!(book = %self.prefs.name, report = ?self.report, "session finished");
        Ok(self.report)
    }

    /// Runs the full sequence without an interactive pause. Intended for
    /// the directional modes; an `ask`-mode plan passes only when every
    /// difference resolved itself.
    ///
    /// ## Errors
    /// Returns an error if any phase fails, including an unresolved plan.
    pub fn run_auto(&mut self) -> EngineResult<SyncReport> {
        self.prepare()?;
        if self.state == SessionState::Done {
            return Ok(self.report);
        }
        self.apply()?;
        self.write_back()
    }

    fn expect_state(&self, expected: SessionState) -> EngineResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CoreError::InvariantViolation("session phase out of order").into())
        }
    }

    /// Mints a UID for every local record lacking one, before matching.
    fn mint_local_uids(&mut self) {
        for mut record in self.contacts.records() {
            if record.uid().is_empty() {
                record.set_uid(ContactRecord::mint_uid());
                self.contacts.upsert(record);
            }
        }
    }

    fn apply_matched(
        &mut self,
        local_uid: &str,
        remote: &RemoteRef,
        entries: &[DifferenceEntry],
    ) -> EngineResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let Some(mut local) = self.contacts.find_by_uid(local_uid) else {
            return Err(CoreError::NotFound(format!("local contact {local_uid}")).into());
        };
        let mut local_changed = false;
        for entry in entries {
            match entry.property {
                DiffProperty::Prop(property) => {
                    self.merge_property(&mut local, remote, property, entry, &mut local_changed);
                }
                DiffProperty::Photo => {
                    self.merge_photo(&mut local, remote, entry.resolution, &mut local_changed)?;
                }
            }
        }

        // The remote side carries the local modification time and, when it
        // arrived without one, the local UID.
        let mut rev = local.get(Property::LastModifiedDate).to_string();
        if rev.is_empty() || rev == "0" {
            rev = chrono::Utc::now().timestamp().to_string();
        }
        self.resources.set_value(
            &self.prefs.name,
            &remote.path,
            remote.index,
            Property::LastModifiedDate,
            &rev,
        );
        if self
            .resources
            .get_value(&self.prefs.name, &remote.path, remote.index, Property::Uid)
            .is_empty()
        {
            self.resources.set_value(
                &self.prefs.name,
                &remote.path,
                remote.index,
                Property::Uid,
                local_uid,
            );
        }

        if local_changed {
            self.contacts.upsert(local);
        }
        self.report.exchanged += 1;
        Ok(())
    }

    fn merge_property(
        &mut self,
        local: &mut ContactRecord,
        remote: &RemoteRef,
        property: Property,
        entry: &DifferenceEntry,
        local_changed: &mut bool,
    ) {
        match entry.resolution {
            Resolution::FromLocal => {
                self.resources.set_value(
                    &self.prefs.name,
                    &remote.path,
                    remote.index,
                    property,
                    &entry.local,
                );
            }
            Resolution::FromRemote => {
                local.set(property, &entry.remote);
                *local_changed = true;
            }
            Resolution::FromLocalDelete => {
                local.set(property, "");
                *local_changed = true;
            }
            Resolution::FromRemoteDelete => {
                self.resources.set_value(
                    &self.prefs.name,
                    &remote.path,
                    remote.index,
                    property,
                    "",
                );
            }
            Resolution::Unequal => {}
        }
    }

    fn merge_photo(
        &mut self,
        local: &mut ContactRecord,
        remote: &RemoteRef,
        resolution: Resolution,
        local_changed: &mut bool,
    ) -> EngineResult<()> {
        match resolution {
            Resolution::FromLocal => {
                self.resources.set_photo(
                    &self.prefs.name,
                    &remote.path,
                    remote.index,
                    local.photo().clone(),
                );
            }
            Resolution::FromRemote => {
                let remote_photo = self
                    .resources
                    .get(&self.prefs.name, &remote.path, remote.index)
                    .map_or(PhotoAttachment::None, |r| r.photo().clone());
                local.set_photo(self.localize_photo(remote_photo)?);
                *local_changed = true;
            }
            Resolution::FromLocalDelete => {
                local.set_photo(PhotoAttachment::None);
                *local_changed = true;
            }
            Resolution::FromRemoteDelete => {
                self.resources.set_photo(
                    &self.prefs.name,
                    &remote.path,
                    remote.index,
                    PhotoAttachment::None,
                );
            }
            Resolution::Unequal => {}
        }
        Ok(())
    }

    /// Converts an incoming photo into its local representation: embedded
    /// bytes become a file in the managed photo directory, everything else
    /// passes through. Unrecognizable image data is dropped.
    fn localize_photo(&mut self, photo: PhotoAttachment) -> EngineResult<PhotoAttachment> {
        match photo {
            PhotoAttachment::Binary(data) => {
                if let Some(suffix) = photo::sniff_suffix(&data) {
                    let name = self.photos.store_photo(&data, suffix)?;
                    Ok(PhotoAttachment::File(name))
                } else {
                    tracing::warn!("unrecognized photo data dropped on import");
                    Ok(PhotoAttachment::None)
                }
            }
            other => Ok(other),
        }
    }

    fn import_remote(&mut self, remote: &RemoteRef) -> EngineResult<()> {
        let Some(record) = self
            .resources
            .get(&self.prefs.name, &remote.path, remote.index)
        else {
            return Ok(());
        };
        let mut record = record.clone();
        if record.uid().is_empty() {
            record.set_uid(ContactRecord::mint_uid());
            self.resources.set_value(
                &self.prefs.name,
                &remote.path,
                remote.index,
                Property::Uid,
                record.uid(),
            );
        }
        let photo = self.localize_photo(record.photo().clone())?;
        record.set_photo(photo);
        tracing::debug!(label = %record.display_label(), "importing remote contact");
        self.contacts.upsert(record);
        self.report.imported += 1;
        Ok(())
    }

    fn export_local(&mut self, local_uid: &str) {
        let Some(record) = self.contacts.find_by_uid(local_uid) else {
            return;
        };
        let path = match self.prefs.format {
            ResourceFormat::VCardFile => PathBuf::from(&self.prefs.path),
            ResourceFormat::VCardDir => {
                let dir = Path::new(&self.prefs.path);
                let stem = if local_uid.is_empty() {
                    random_numerals()
                } else {
                    local_uid.to_string()
                };
                dir.join(format!("{stem}.{FILE_SUFFIX}"))
            }
        };
        tracing::debug!(label = %record.display_label(), path = %path.display(), "exporting local contact");
        self.resources.append(&self.prefs.name, &path, record);
        self.report.exported += 1;
    }

    fn delete_local(&mut self, local_uid: &str) -> EngineResult<()> {
        if let Some(record) = self.contacts.find_by_uid(local_uid) {
            if let PhotoAttachment::File(name) = record.photo() {
                self.photos.remove_photo(name)?;
            }
        }
        if self.contacts.delete(local_uid) {
            self.report.deleted_local += 1;
        }
        Ok(())
    }

    fn encode_resource(
        &self,
        records: &[&ContactRecord],
        charset: Charset,
    ) -> Result<Vec<u8>, EncodeError> {
        let options = EncodeOptions {
            charset,
            hide_uid: self.prefs.hide_uid,
            quoted_printable: self.prefs.quoted_printable,
            folding: self.prefs.folding,
        };
        let photos: &dyn PhotoSource = &*self.photos;
        let mut out = Vec::new();
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(&encode(record, &options, photos)?);
        }
        Ok(out)
    }
}
