//! Nested (secondary) structures embedded inside primary objects.
//!
//! None of these have a handle of their own. Several of them carry handles
//! pointing at primary objects, and each implements [`HasReferences`] so the
//! reference walk can descend through them.

use serde::{Deserialize, Serialize};

use crate::handle::Handle;
use crate::object_type::ObjectType;
use crate::reference::{HasReferences, RefCollector};
use crate::registry::{CustomValueSink, RegistryKind};

/// Value of an enum-like field: either a standard name or a user-introduced one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomType {
    pub value: String,
    #[serde(default)]
    pub custom: bool,
}

impl CustomType {
    pub fn standard(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            custom: false,
        }
    }

    pub fn custom(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            custom: true,
        }
    }

    pub fn is_custom(&self) -> bool {
        self.custom
    }

    /// Report the value to `sink` when it is custom and non-empty.
    pub fn record_custom(&self, kind: RegistryKind, sink: &mut dyn CustomValueSink) {
        if self.custom && !self.value.is_empty() {
            sink.record(kind, &self.value);
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    #[default]
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub attr_type: CustomType,
    pub value: String,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl Attribute {
    pub fn new(attr_type: CustomType, value: impl Into<String>) -> Self {
        Self {
            attr_type,
            value: value.into(),
            ..Default::default()
        }
    }
}

impl HasReferences for Attribute {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
    }
}

/// Report custom attribute types of a list into one registry.
pub fn record_attributes(list: &[Attribute], kind: RegistryKind, sink: &mut dyn CustomValueSink) {
    for attr in list {
        attr.attr_type.record_custom(kind, sink);
    }
}

/// Surname origins excluded from person sort keys; they change every generation.
pub const PATRONYMIC: &str = "Patronymic";
pub const MATRONYMIC: &str = "Matronymic";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surname {
    pub surname: String,
    pub prefix: String,
    pub primary: bool,
    pub origin_type: CustomType,
    pub connector: String,
}

impl Surname {
    pub fn new(surname: impl Into<String>) -> Self {
        Self {
            surname: surname.into(),
            primary: true,
            ..Default::default()
        }
    }

    /// Patronymic and matronymic surnames are not used for ordering.
    pub fn is_sortable(&self) -> bool {
        !(self.origin_type.value == PATRONYMIC || self.origin_type.value == MATRONYMIC)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub first_name: String,
    pub surname_list: Vec<Surname>,
    pub suffix: String,
    pub title: String,
    pub call: String,
    pub nick: String,
    pub name_type: CustomType,
    pub group_as: String,
    pub date: String,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl Name {
    pub fn new(first_name: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            surname_list: vec![Surname::new(surname)],
            ..Default::default()
        }
    }

    /// The first surname, which drives the surname list.
    pub fn primary_surname(&self) -> Option<&str> {
        self.surname_list.first().map(|s| s.surname.as_str())
    }
}

impl HasReferences for Name {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    #[serde(rename = "ref")]
    pub ref_handle: Handle,
    pub role: CustomType,
    pub attribute_list: Vec<Attribute>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl EventRef {
    pub fn new(event: Handle) -> Self {
        Self {
            ref_handle: event,
            role: CustomType::standard("Primary"),
            ..Default::default()
        }
    }
}

impl HasReferences for EventRef {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add(ObjectType::Event, &self.ref_handle);
        refs.walk(&self.attribute_list);
        refs.add_all(ObjectType::Note, &self.note_list);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    #[serde(rename = "ref")]
    pub ref_handle: Handle,
    pub frel: CustomType,
    pub mrel: CustomType,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl ChildRef {
    pub fn new(child: Handle) -> Self {
        Self {
            ref_handle: child,
            frel: CustomType::standard("Birth"),
            mrel: CustomType::standard("Birth"),
            ..Default::default()
        }
    }
}

impl HasReferences for ChildRef {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add(ObjectType::Person, &self.ref_handle);
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
    }
}

/// Association between two people (godfather, witness, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    #[serde(rename = "ref")]
    pub ref_handle: Handle,
    pub rel: String,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl HasReferences for PersonRef {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add(ObjectType::Person, &self.ref_handle);
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    #[serde(rename = "ref")]
    pub ref_handle: Handle,
    /// Region of interest as `[x1, y1, x2, y2]` percentages.
    pub rect: Option<[u8; 4]>,
    pub attribute_list: Vec<Attribute>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl MediaRef {
    pub fn new(media: Handle) -> Self {
        Self {
            ref_handle: media,
            ..Default::default()
        }
    }
}

impl HasReferences for MediaRef {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add(ObjectType::Media, &self.ref_handle);
        refs.walk(&self.attribute_list);
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
    }
}

/// Report custom attribute types found on media references.
pub fn record_media_attributes(list: &[MediaRef], sink: &mut dyn CustomValueSink) {
    for mref in list {
        record_attributes(&mref.attribute_list, RegistryKind::MediaAttributes, sink);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    #[serde(rename = "ref")]
    pub ref_handle: Handle,
    pub call_number: String,
    pub media_type: CustomType,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl HasReferences for RepoRef {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add(ObjectType::Repository, &self.ref_handle);
        refs.add_all(ObjectType::Note, &self.note_list);
    }
}

/// Link from a place to an enclosing place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceRef {
    #[serde(rename = "ref")]
    pub ref_handle: Handle,
    pub date: String,
}

impl HasReferences for PlaceRef {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add(ObjectType::Place, &self.ref_handle);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub locality: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal: String,
    pub phone: String,
    pub date: String,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl HasReferences for Address {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Url {
    pub path: String,
    pub desc: String,
    pub url_type: CustomType,
    pub private: bool,
}

pub fn record_urls(list: &[Url], sink: &mut dyn CustomValueSink) {
    for url in list {
        url.url_type.record_custom(RegistryKind::UrlTypes, sink);
    }
}

/// Latter-day Saints ordinance record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdsOrd {
    pub ord_type: String,
    pub status: String,
    pub temple: String,
    pub date: String,
    pub famc: Option<Handle>,
    pub place: Option<Handle>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl HasReferences for LdsOrd {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add_opt(ObjectType::Family, self.famc.as_ref());
        refs.add_opt(ObjectType::Place, self.place.as_ref());
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ref_walks_into_attributes() {
        let mut attr = Attribute::new(CustomType::standard("Age"), "42");
        attr.citation_list.push(Handle::from("c1"));
        let mut eref = EventRef::new(Handle::from("e1"));
        eref.attribute_list.push(attr);
        eref.note_list.push(Handle::from("n1"));

        let mut refs = RefCollector::new();
        eref.collect_references(&mut refs);
        let refs = refs.into_refs();
        assert_eq!(refs.len(), 3);
        assert!(refs.iter().any(|r| r.object_type == ObjectType::Citation));
        assert!(refs.iter().any(|r| r.object_type == ObjectType::Event));
    }

    #[test]
    fn patronymic_surnames_are_not_sortable() {
        let mut s = Surname::new("Olafsson");
        assert!(s.is_sortable());
        s.origin_type = CustomType::standard(PATRONYMIC);
        assert!(!s.is_sortable());
    }

    #[test]
    fn record_custom_skips_standard_and_empty() {
        let mut seen = Vec::new();
        let mut sink = |kind: RegistryKind, v: &str| seen.push((kind, v.to_string()));
        CustomType::standard("Birth").record_custom(RegistryKind::EventNames, &mut sink);
        CustomType::custom("").record_custom(RegistryKind::EventNames, &mut sink);
        CustomType::custom("Hunt").record_custom(RegistryKind::EventNames, &mut sink);
        assert_eq!(seen, vec![(RegistryKind::EventNames, "Hunt".to_string())]);
    }
}
