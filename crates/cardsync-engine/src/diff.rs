//! Per-property difference computation.
//!
//! For a matched local/remote pair, every property in the comparison set
//! yields at most one [`DifferenceEntry`] with a proposed resolution. The
//! per-property filter and the address-book sync mode decide both whether
//! a property is compared at all and which resolution it defaults to.

use cardsync_core::config::FilterPolicy;
use cardsync_core::{ContactRecord, FilterAction, PhotoAttachment, Property, SyncMode};
use cardsync_vcard::PhotoSource;
use serde::{Deserialize, Serialize};

/// Display token standing in for photo bytes in a plan entry.
pub const PHOTO_PLACEHOLDER: &str = "[photo]";

/// How one property difference is to be resolved.
///
/// `FromLocal`/`FromRemote` copy the named side onto the other;
/// `FromLocalDelete`/`FromRemoteDelete` clear the named side's value;
/// `Unequal` is the unresolved interactive state and blocks application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    FromLocal,
    FromRemote,
    FromLocalDelete,
    FromRemoteDelete,
    Unequal,
}

/// The compared property: a regular record property or the photo
/// aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffProperty {
    Prop(Property),
    Photo,
}

impl DiffProperty {
    /// The name used for filter-policy lookup and display.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Prop(property) => property.as_str(),
            Self::Photo => "Photo",
        }
    }
}

/// One difference between a matched local/remote pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferenceEntry {
    pub property: DiffProperty,
    /// Local display value (photo bytes replaced by a placeholder).
    pub local: String,
    /// Remote display value (photo bytes replaced by a placeholder).
    pub remote: String,
    pub resolution: Resolution,
}

impl DifferenceEntry {
    /// Advances the resolution to the next interactive state.
    ///
    /// The cycle alternates between the two directions; when the opposite
    /// side is empty, the intermediate stop is the delete state for the
    /// side that still has a value.
    pub fn cycle(&mut self) {
        self.resolution = match self.resolution {
            Resolution::Unequal => Resolution::FromLocal,
            Resolution::FromLocal => {
                if self.remote.is_empty() {
                    Resolution::FromLocalDelete
                } else {
                    Resolution::FromRemote
                }
            }
            Resolution::FromLocalDelete => Resolution::FromLocal,
            Resolution::FromRemote => {
                if self.local.is_empty() {
                    Resolution::FromRemoteDelete
                } else {
                    Resolution::FromLocal
                }
            }
            Resolution::FromRemoteDelete => Resolution::FromRemote,
        };
    }

    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.resolution == Resolution::Unequal
    }
}

/// Contact-level aggregate over a difference list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactState {
    /// No differences.
    InSync,
    /// All differences carry a directional resolution.
    Exchange,
    /// At least one difference is unresolved; blocks session completion.
    Unequal,
}

/// Summarizes a difference list.
#[must_use]
pub fn contact_state(entries: &[DifferenceEntry]) -> ContactState {
    if entries.is_empty() {
        ContactState::InSync
    } else if entries.iter().any(DifferenceEntry::is_unresolved) {
        ContactState::Unequal
    } else {
        ContactState::Exchange
    }
}

/// Compares a matched pair property-by-property.
///
/// Entries whose effective filter is `ignore` (including everything when
/// the sync mode is `no`) are never materialized.
#[must_use]
pub fn diff(
    local: &ContactRecord,
    remote: &ContactRecord,
    policy: &FilterPolicy,
    mode: SyncMode,
    photos: &dyn PhotoSource,
) -> Vec<DifferenceEntry> {
    let mut entries = Vec::new();

    for property in comparison_set() {
        let Some(action) = effective_action(policy, mode, property.as_str()) else {
            continue;
        };
        let local_value = comparable(local.get(property));
        let remote_value = comparable(remote.get(property));
        if let Some(resolution) = propose(action, &local_value, &remote_value) {
            entries.push(DifferenceEntry {
                property: DiffProperty::Prop(property),
                local: local_value,
                remote: remote_value,
                resolution,
            });
        }
    }

    if let Some(action) = effective_action(policy, mode, "Photo") {
        let local_bytes = photo_surrogate(local.photo(), photos);
        let remote_bytes = photo_surrogate(remote.photo(), photos);
        let local_display = display_surrogate(&local_bytes);
        let remote_display = display_surrogate(&remote_bytes);
        if let Some(resolution) = propose_bytes(action, &local_bytes, &remote_bytes) {
            entries.push(DifferenceEntry {
                property: DiffProperty::Photo,
                local: local_display,
                remote: remote_display,
                resolution,
            });
        }
    }

    entries
}

/// The properties compared between matched contacts: base properties,
/// extension properties, and the messenger handles.
fn comparison_set() -> impl Iterator<Item = Property> {
    Property::BASE
        .iter()
        .chain(Property::EXTENSIONS)
        .copied()
        .chain(
            Property::MESSENGERS
                .iter()
                .map(|&(p, _)| p)
                .filter(|p| !Property::EXTENSIONS.contains(p)),
        )
}

/// The per-property filter after the sync mode is applied: `no` drops
/// everything, `export`/`import` override the filter wholesale, `ask`
/// defers to the per-property policy. `None` means skip.
fn effective_action(policy: &FilterPolicy, mode: SyncMode, name: &str) -> Option<FilterAction> {
    let action = match mode {
        SyncMode::No => return None,
        SyncMode::Export => FilterAction::Export,
        SyncMode::Import => FilterAction::Import,
        SyncMode::Ask => policy.action(name).unwrap_or(FilterAction::Ask),
    };
    (action != FilterAction::Ignore).then_some(action)
}

/// Numeric zero compares as empty, matching the host store's habit of
/// materializing unset numeric properties as `0`.
fn comparable(value: &str) -> String {
    if value == "0" {
        String::new()
    } else {
        value.to_string()
    }
}

/// Resolves a photo to its comparable surrogate: web references and
/// absent photos compare as empty, file references by their bytes, and
/// embedded data by the raw stored bytes.
fn photo_surrogate(photo: &PhotoAttachment, photos: &dyn PhotoSource) -> Vec<u8> {
    match photo {
        PhotoAttachment::None | PhotoAttachment::Web(_) => Vec::new(),
        PhotoAttachment::File(name) => photos.read_photo(name).unwrap_or_default(),
        PhotoAttachment::Binary(data) => data.clone(),
    }
}

fn display_surrogate(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        String::new()
    } else {
        PHOTO_PLACEHOLDER.to_string()
    }
}

fn propose(action: FilterAction, local: &str, remote: &str) -> Option<Resolution> {
    propose_impl(action, local == remote, local.is_empty(), remote.is_empty())
}

fn propose_bytes(action: FilterAction, local: &[u8], remote: &[u8]) -> Option<Resolution> {
    propose_impl(action, local == remote, local.is_empty(), remote.is_empty())
}

fn propose_impl(
    action: FilterAction,
    equal: bool,
    local_empty: bool,
    remote_empty: bool,
) -> Option<Resolution> {
    if equal {
        return None;
    }
    let resolution = match action {
        FilterAction::Export => {
            if local_empty {
                Resolution::FromRemoteDelete
            } else {
                Resolution::FromLocal
            }
        }
        FilterAction::Import => {
            if remote_empty {
                Resolution::FromLocalDelete
            } else {
                Resolution::FromRemote
            }
        }
        FilterAction::Ask => {
            if local_empty {
                Resolution::FromRemote
            } else if remote_empty {
                Resolution::FromLocal
            } else {
                Resolution::Unequal
            }
        }
        FilterAction::Ignore => return None,
    };
    Some(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsync_vcard::NoPhotos;

    fn pair(local_notes: &str, remote_notes: &str) -> (ContactRecord, ContactRecord) {
        let mut local = ContactRecord::new();
        local.set(Property::Notes, local_notes);
        let mut remote = ContactRecord::new();
        remote.set(Property::Notes, remote_notes);
        (local, remote)
    }

    fn only_entry(entries: Vec<DifferenceEntry>) -> DifferenceEntry {
        assert_eq!(entries.len(), 1);
        entries.into_iter().next().unwrap()
    }

    #[test]
    fn equal_values_produce_no_entry() {
        let (local, remote) = pair("same", "same");
        let entries = diff(&local, &remote, &FilterPolicy::default(), SyncMode::Ask, &NoPhotos);
        assert!(entries.is_empty());
    }

    #[test]
    fn sync_mode_no_ignores_everything() {
        let (local, remote) = pair("a", "b");
        let entries = diff(&local, &remote, &FilterPolicy::default(), SyncMode::No, &NoPhotos);
        assert!(entries.is_empty());
    }

    #[test]
    fn interactive_conflict_is_unequal() {
        let (local, remote) = pair("a", "b");
        let entry = only_entry(diff(
            &local,
            &remote,
            &FilterPolicy::default(),
            SyncMode::Ask,
            &NoPhotos,
        ));
        assert_eq!(entry.resolution, Resolution::Unequal);
        assert_eq!(contact_state(&[entry]), ContactState::Unequal);
    }

    #[test]
    fn interactive_one_sided_values_get_a_direction() {
        let (local, remote) = pair("a", "");
        let entry = only_entry(diff(
            &local,
            &remote,
            &FilterPolicy::default(),
            SyncMode::Ask,
            &NoPhotos,
        ));
        assert_eq!(entry.resolution, Resolution::FromLocal);

        let (local, remote) = pair("", "b");
        let entry = only_entry(diff(
            &local,
            &remote,
            &FilterPolicy::default(),
            SyncMode::Ask,
            &NoPhotos,
        ));
        assert_eq!(entry.resolution, Resolution::FromRemote);
    }

    #[test]
    fn export_mode_prefers_local_and_clears_remote_only_values() {
        let (local, remote) = pair("a", "b");
        let entry = only_entry(diff(
            &local,
            &remote,
            &FilterPolicy::default(),
            SyncMode::Export,
            &NoPhotos,
        ));
        assert_eq!(entry.resolution, Resolution::FromLocal);

        let (local, remote) = pair("", "b");
        let entry = only_entry(diff(
            &local,
            &remote,
            &FilterPolicy::default(),
            SyncMode::Export,
            &NoPhotos,
        ));
        assert_eq!(entry.resolution, Resolution::FromRemoteDelete);
    }

    #[test]
    fn import_mode_prefers_remote_and_clears_local_only_values() {
        let (local, remote) = pair("a", "b");
        let entry = only_entry(diff(
            &local,
            &remote,
            &FilterPolicy::default(),
            SyncMode::Import,
            &NoPhotos,
        ));
        assert_eq!(entry.resolution, Resolution::FromRemote);

        let (local, remote) = pair("a", "");
        let entry = only_entry(diff(
            &local,
            &remote,
            &FilterPolicy::default(),
            SyncMode::Import,
            &NoPhotos,
        ));
        assert_eq!(entry.resolution, Resolution::FromLocalDelete);
    }

    #[test]
    fn filter_ignore_suppresses_the_property() {
        let (local, remote) = pair("a", "b");
        let mut policy = FilterPolicy::default();
        policy.set("Notes", FilterAction::Ignore);
        let entries = diff(&local, &remote, &policy, SyncMode::Ask, &NoPhotos);
        assert!(entries.is_empty());
    }

    #[test]
    fn filter_is_overridden_by_directional_sync_mode() {
        let (local, remote) = pair("a", "b");
        let mut policy = FilterPolicy::default();
        policy.set("Notes", FilterAction::Ignore);
        let entries = diff(&local, &remote, &policy, SyncMode::Export, &NoPhotos);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn numeric_zero_compares_as_empty() {
        let mut local = ContactRecord::new();
        local.set(Property::PopularityIndex, "0");
        let remote = ContactRecord::new();
        let entries = diff(&local, &remote, &FilterPolicy::default(), SyncMode::Ask, &NoPhotos);
        assert!(entries.is_empty());
    }

    #[test]
    fn photo_differences_use_placeholder() {
        let mut local = ContactRecord::new();
        local.set_photo(PhotoAttachment::Binary(vec![1, 2, 3]));
        let remote = ContactRecord::new();
        let entry = only_entry(diff(
            &local,
            &remote,
            &FilterPolicy::default(),
            SyncMode::Ask,
            &NoPhotos,
        ));
        assert_eq!(entry.property, DiffProperty::Photo);
        assert_eq!(entry.local, PHOTO_PLACEHOLDER);
        assert_eq!(entry.remote, "");
        assert_eq!(entry.resolution, Resolution::FromLocal);
    }

    #[test]
    fn web_photos_compare_as_empty() {
        let mut local = ContactRecord::new();
        local.set_photo(PhotoAttachment::Web("http://example.com/a.png".into()));
        let remote = ContactRecord::new();
        let entries = diff(&local, &remote, &FilterPolicy::default(), SyncMode::Ask, &NoPhotos);
        assert!(entries.is_empty());
    }

    #[test]
    fn cycle_walks_the_interactive_states() {
        let mut entry = DifferenceEntry {
            property: DiffProperty::Prop(Property::Notes),
            local: "a".to_string(),
            remote: "b".to_string(),
            resolution: Resolution::Unequal,
        };
        entry.cycle();
        assert_eq!(entry.resolution, Resolution::FromLocal);
        entry.cycle();
        assert_eq!(entry.resolution, Resolution::FromRemote);
        entry.cycle();
        assert_eq!(entry.resolution, Resolution::FromLocal);
    }

    #[test]
    fn cycle_offers_delete_when_other_side_is_empty() {
        let mut entry = DifferenceEntry {
            property: DiffProperty::Prop(Property::Notes),
            local: "a".to_string(),
            remote: String::new(),
            resolution: Resolution::FromLocal,
        };
        entry.cycle();
        assert_eq!(entry.resolution, Resolution::FromLocalDelete);
        entry.cycle();
        assert_eq!(entry.resolution, Resolution::FromLocal);
    }
}
