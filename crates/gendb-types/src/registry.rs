use std::fmt;

use serde::{Deserialize, Serialize};

/// Registries of user-introduced values for enum-like fields.
///
/// Whenever a committed object carries a custom (non-standard) value in one
/// of these fields, the value is remembered so editors can offer it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegistryKind {
    EventNames,
    PersonAttributes,
    FamilyAttributes,
    SourceAttributes,
    MediaAttributes,
    EventAttributes,
    ChildRefTypes,
    FamilyRelTypes,
    EventRoles,
    NameTypes,
    OriginTypes,
    RepositoryTypes,
    NoteTypes,
    SourceMediaTypes,
    UrlTypes,
    PlaceTypes,
}

impl RegistryKind {
    pub const ALL: [RegistryKind; 16] = [
        RegistryKind::EventNames,
        RegistryKind::PersonAttributes,
        RegistryKind::FamilyAttributes,
        RegistryKind::SourceAttributes,
        RegistryKind::MediaAttributes,
        RegistryKind::EventAttributes,
        RegistryKind::ChildRefTypes,
        RegistryKind::FamilyRelTypes,
        RegistryKind::EventRoles,
        RegistryKind::NameTypes,
        RegistryKind::OriginTypes,
        RegistryKind::RepositoryTypes,
        RegistryKind::NoteTypes,
        RegistryKind::SourceMediaTypes,
        RegistryKind::UrlTypes,
        RegistryKind::PlaceTypes,
    ];

    /// Metadata key the registry is persisted under.
    pub const fn metadata_key(self) -> &'static str {
        match self {
            Self::EventNames => "event_names",
            Self::PersonAttributes => "pattr_names",
            Self::FamilyAttributes => "fattr_names",
            Self::SourceAttributes => "sattr_names",
            Self::MediaAttributes => "mattr_names",
            Self::EventAttributes => "eattr_names",
            Self::ChildRefTypes => "child_refs",
            Self::FamilyRelTypes => "family_rels",
            Self::EventRoles => "event_roles",
            Self::NameTypes => "name_types",
            Self::OriginTypes => "origin_types",
            Self::RepositoryTypes => "repo_types",
            Self::NoteTypes => "note_types",
            Self::SourceMediaTypes => "sm_types",
            Self::UrlTypes => "url_types",
            Self::PlaceTypes => "place_types",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metadata_key())
    }
}

/// Receives custom values found while scanning an object.
pub trait CustomValueSink {
    fn record(&mut self, kind: RegistryKind, value: &str);
}

impl<F: FnMut(RegistryKind, &str)> CustomValueSink for F {
    fn record(&mut self, kind: RegistryKind, value: &str) {
        self(kind, value)
    }
}
