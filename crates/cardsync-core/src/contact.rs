//! The contact data model.
//!
//! A [`ContactRecord`] is a closed property bag keyed by the fixed
//! [`Property`] enumeration, with an open extension map for forward
//! compatibility with unknown `X-MOZILLA-PROPERTY` entries, plus the photo
//! attachment which never fits the string-property shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The fixed property vocabulary of a contact record.
///
/// Base properties map to native vCard properties; extension properties are
/// carried as `X-MOZILLA-PROPERTY` lines or messenger-handle `X-*` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Property {
    // Identity
    LastName,
    FirstName,
    DisplayName,
    PrimaryEmail,
    SecondEmail,
    // Home address
    HomeAddress,
    HomeAddress2,
    HomeCity,
    HomeState,
    HomeZipCode,
    HomeCountry,
    // Work address
    WorkAddress,
    WorkAddress2,
    WorkCity,
    WorkState,
    WorkZipCode,
    WorkCountry,
    // Phone numbers
    HomePhone,
    WorkPhone,
    FaxNumber,
    CellularNumber,
    PagerNumber,
    // Organization
    JobTitle,
    Department,
    Company,
    WebPage1,
    WebPage2,
    // Birthday
    BirthYear,
    BirthMonth,
    BirthDay,
    Notes,

    // Extension properties (X-MOZILLA-PROPERTY)
    NickName,
    PhoneticFirstName,
    PhoneticLastName,
    SpouseName,
    FamilyName,
    AnniversaryDay,
    AnniversaryMonth,
    AnniversaryYear,
    HomePhoneType,
    WorkPhoneType,
    FaxNumberType,
    PagerNumberType,
    CellularNumberType,
    // Messenger handles (dedicated X-* lines)
    AimScreenName,
    Icq,
    GoogleTalk,
    JabberId,
    Msn,
    Yahoo,
    Skype,
    // Numeric extension properties
    PopularityIndex,
    PreferMailFormat,
    AllowRemoteContent,
    Custom1,
    Custom2,
    Custom3,
    Custom4,

    // Bookkeeping (not part of the base/extension comparison sets)
    Uid,
    LastModifiedDate,
}

impl Property {
    /// Base identity/contact properties stored as native vCard properties.
    /// Also the comparison set of the probabilistic matcher.
    pub const BASE: &'static [Self] = &[
        Self::LastName,
        Self::FirstName,
        Self::DisplayName,
        Self::PrimaryEmail,
        Self::SecondEmail,
        Self::HomeAddress,
        Self::HomeAddress2,
        Self::HomeCity,
        Self::HomeState,
        Self::HomeZipCode,
        Self::HomeCountry,
        Self::WorkAddress,
        Self::WorkAddress2,
        Self::WorkCity,
        Self::WorkState,
        Self::WorkZipCode,
        Self::WorkCountry,
        Self::HomePhone,
        Self::WorkPhone,
        Self::FaxNumber,
        Self::CellularNumber,
        Self::PagerNumber,
        Self::JobTitle,
        Self::Department,
        Self::Company,
        Self::WebPage1,
        Self::WebPage2,
        Self::BirthYear,
        Self::BirthMonth,
        Self::BirthDay,
        Self::Notes,
    ];

    /// Extension properties serialized as `X-MOZILLA-PROPERTY` lines.
    pub const EXTENSIONS: &'static [Self] = &[
        Self::NickName,
        Self::PhoneticFirstName,
        Self::PhoneticLastName,
        Self::SpouseName,
        Self::FamilyName,
        Self::AnniversaryDay,
        Self::AnniversaryMonth,
        Self::AnniversaryYear,
        Self::HomePhoneType,
        Self::WorkPhoneType,
        Self::FaxNumberType,
        Self::PagerNumberType,
        Self::CellularNumberType,
        Self::AimScreenName,
        Self::PopularityIndex,
        Self::PreferMailFormat,
        Self::AllowRemoteContent,
        Self::Custom1,
        Self::Custom2,
        Self::Custom3,
        Self::Custom4,
    ];

    /// Messenger handles with dedicated `X-*` vCard lines, paired with
    /// their line names.
    pub const MESSENGERS: &'static [(Self, &'static str)] = &[
        (Self::AimScreenName, "X-AIM"),
        (Self::Icq, "X-ICQ"),
        (Self::GoogleTalk, "X-GOOGLE-TALK"),
        (Self::JabberId, "X-JABBER"),
        (Self::Msn, "X-MSN"),
        (Self::Yahoo, "X-YAHOO"),
        (Self::Skype, "X-SKYPE"),
    ];

    /// Properties holding integer values; invalid numeric input decodes to 0.
    pub const NUMERIC: &'static [Self] = &[
        Self::PopularityIndex,
        Self::PreferMailFormat,
        Self::AllowRemoteContent,
        Self::LastModifiedDate,
    ];

    /// Returns the property name as used by the host address-book store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastName => "LastName",
            Self::FirstName => "FirstName",
            Self::DisplayName => "DisplayName",
            Self::PrimaryEmail => "PrimaryEmail",
            Self::SecondEmail => "SecondEmail",
            Self::HomeAddress => "HomeAddress",
            Self::HomeAddress2 => "HomeAddress2",
            Self::HomeCity => "HomeCity",
            Self::HomeState => "HomeState",
            Self::HomeZipCode => "HomeZipCode",
            Self::HomeCountry => "HomeCountry",
            Self::WorkAddress => "WorkAddress",
            Self::WorkAddress2 => "WorkAddress2",
            Self::WorkCity => "WorkCity",
            Self::WorkState => "WorkState",
            Self::WorkZipCode => "WorkZipCode",
            Self::WorkCountry => "WorkCountry",
            Self::HomePhone => "HomePhone",
            Self::WorkPhone => "WorkPhone",
            Self::FaxNumber => "FaxNumber",
            Self::CellularNumber => "CellularNumber",
            Self::PagerNumber => "PagerNumber",
            Self::JobTitle => "JobTitle",
            Self::Department => "Department",
            Self::Company => "Company",
            Self::WebPage1 => "WebPage1",
            Self::WebPage2 => "WebPage2",
            Self::BirthYear => "BirthYear",
            Self::BirthMonth => "BirthMonth",
            Self::BirthDay => "BirthDay",
            Self::Notes => "Notes",
            Self::NickName => "NickName",
            Self::PhoneticFirstName => "PhoneticFirstName",
            Self::PhoneticLastName => "PhoneticLastName",
            Self::SpouseName => "SpouseName",
            Self::FamilyName => "FamilyName",
            Self::AnniversaryDay => "AnniversaryDay",
            Self::AnniversaryMonth => "AnniversaryMonth",
            Self::AnniversaryYear => "AnniversaryYear",
            Self::HomePhoneType => "HomePhoneType",
            Self::WorkPhoneType => "WorkPhoneType",
            Self::FaxNumberType => "FaxNumberType",
            Self::PagerNumberType => "PagerNumberType",
            Self::CellularNumberType => "CellularNumberType",
            Self::AimScreenName => "_AimScreenName",
            Self::Icq => "_ICQ",
            Self::GoogleTalk => "_GoogleTalk",
            Self::JabberId => "_JabberId",
            Self::Msn => "_MSN",
            Self::Yahoo => "_Yahoo",
            Self::Skype => "_Skype",
            Self::PopularityIndex => "PopularityIndex",
            Self::PreferMailFormat => "PreferMailFormat",
            Self::AllowRemoteContent => "AllowRemoteContent",
            Self::Custom1 => "Custom1",
            Self::Custom2 => "Custom2",
            Self::Custom3 => "Custom3",
            Self::Custom4 => "Custom4",
            Self::Uid => "UID",
            Self::LastModifiedDate => "LastModifiedDate",
        }
    }

    /// Looks up a property by its host-store name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.as_str() == name)
    }

    /// Returns whether this property carries an integer value.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        Self::NUMERIC.contains(&self)
    }

    fn all() -> &'static [Self] {
        const ALL: &[Property] = &[
            Property::LastName,
            Property::FirstName,
            Property::DisplayName,
            Property::PrimaryEmail,
            Property::SecondEmail,
            Property::HomeAddress,
            Property::HomeAddress2,
            Property::HomeCity,
            Property::HomeState,
            Property::HomeZipCode,
            Property::HomeCountry,
            Property::WorkAddress,
            Property::WorkAddress2,
            Property::WorkCity,
            Property::WorkState,
            Property::WorkZipCode,
            Property::WorkCountry,
            Property::HomePhone,
            Property::WorkPhone,
            Property::FaxNumber,
            Property::CellularNumber,
            Property::PagerNumber,
            Property::JobTitle,
            Property::Department,
            Property::Company,
            Property::WebPage1,
            Property::WebPage2,
            Property::BirthYear,
            Property::BirthMonth,
            Property::BirthDay,
            Property::Notes,
            Property::NickName,
            Property::PhoneticFirstName,
            Property::PhoneticLastName,
            Property::SpouseName,
            Property::FamilyName,
            Property::AnniversaryDay,
            Property::AnniversaryMonth,
            Property::AnniversaryYear,
            Property::HomePhoneType,
            Property::WorkPhoneType,
            Property::FaxNumberType,
            Property::PagerNumberType,
            Property::CellularNumberType,
            Property::AimScreenName,
            Property::Icq,
            Property::GoogleTalk,
            Property::JabberId,
            Property::Msn,
            Property::Yahoo,
            Property::Skype,
            Property::PopularityIndex,
            Property::PreferMailFormat,
            Property::AllowRemoteContent,
            Property::Custom1,
            Property::Custom2,
            Property::Custom3,
            Property::Custom4,
            Property::Uid,
            Property::LastModifiedDate,
        ];
        ALL
    }
}

/// A contact photo.
///
/// `Binary` is a transient decode state: before an imported record becomes a
/// persistent local record the bytes are written into the managed photo
/// directory and the attachment switches to `File`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum PhotoAttachment {
    /// No photo set.
    #[default]
    None,
    /// Web reference (URI).
    Web(String),
    /// File name within the managed photo directory.
    File(String),
    /// Raw embedded bytes pending conversion.
    Binary(Vec<u8>),
}

impl PhotoAttachment {
    /// Returns whether no photo is present.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// A single contact record, local or decoded from a remote resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    #[serde(default)]
    props: BTreeMap<Property, String>,
    /// Unknown `X-MOZILLA-PROPERTY` names, preserved verbatim.
    #[serde(default)]
    extras: BTreeMap<String, String>,
    #[serde(default)]
    photo: PhotoAttachment,
}

impl ContactRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the property value, or `""` when unset.
    #[must_use]
    pub fn get(&self, property: Property) -> &str {
        self.props.get(&property).map_or("", String::as_str)
    }

    /// Sets a property value. Setting `""` clears the slot.
    pub fn set(&mut self, property: Property, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.props.remove(&property);
        } else {
            self.props.insert(property, value);
        }
    }

    /// Returns a free-form extension value, or `""` when unset.
    #[must_use]
    pub fn get_extra(&self, name: &str) -> &str {
        self.extras.get(name).map_or("", String::as_str)
    }

    /// Sets a free-form extension value. Setting `""` clears the slot.
    pub fn set_extra(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if value.is_empty() {
            self.extras.remove(&name);
        } else {
            self.extras.insert(name, value);
        }
    }

    /// Iterates over set extension entries.
    pub fn extras(&self) -> impl Iterator<Item = (&str, &str)> {
        self.extras.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the photo attachment.
    #[must_use]
    pub fn photo(&self) -> &PhotoAttachment {
        &self.photo
    }

    /// Replaces the photo attachment.
    pub fn set_photo(&mut self, photo: PhotoAttachment) {
        self.photo = photo;
    }

    /// Returns the UID, or `""` when none was assigned yet.
    #[must_use]
    pub fn uid(&self) -> &str {
        self.get(Property::Uid)
    }

    /// Assigns the UID.
    pub fn set_uid(&mut self, uid: impl Into<String>) {
        self.set(Property::Uid, uid);
    }

    /// Mints a fresh v4 UID.
    #[must_use]
    pub fn mint_uid() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Derives a human-readable label for plan display.
    ///
    /// Order of evaluation: display name; "Last, First"; last name; first
    /// name; primary email; UID.
    #[must_use]
    pub fn display_label(&self) -> String {
        let display = self.get(Property::DisplayName);
        if !display.is_empty() {
            return display.to_string();
        }
        let last = self.get(Property::LastName);
        let first = self.get(Property::FirstName);
        if !last.is_empty() {
            if first.is_empty() {
                return last.to_string();
            }
            return format!("{last}, {first}");
        }
        if !first.is_empty() {
            return first.to_string();
        }
        let email = self.get(Property::PrimaryEmail);
        if !email.is_empty() {
            return email.to_string();
        }
        self.uid().to_string()
    }
}
