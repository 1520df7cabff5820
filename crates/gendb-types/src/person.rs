use serde::{Deserialize, Serialize};

use crate::handle::{GrampsId, Handle};
use crate::object_type::ObjectType;
use crate::reference::{HasReferences, RefCollector};
use crate::registry::{CustomValueSink, RegistryKind};
use crate::secondary::{
    record_attributes, record_media_attributes, record_urls, Address, Attribute, EventRef,
    Gender, LdsOrd, MediaRef, Name, PersonRef, Url,
};

/// An individual.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub handle: Handle,
    pub gramps_id: GrampsId,
    /// Seconds since the epoch of the last commit.
    pub change: i64,
    pub gender: Gender,
    pub primary_name: Name,
    pub alternate_names: Vec<Name>,
    pub event_ref_list: Vec<EventRef>,
    /// Index into `event_ref_list` of the birth event, if any.
    pub birth_ref_index: Option<usize>,
    pub death_ref_index: Option<usize>,
    /// Families in which this person is a spouse.
    pub family_list: Vec<Handle>,
    /// Families in which this person is a child.
    pub parent_family_list: Vec<Handle>,
    pub media_list: Vec<MediaRef>,
    pub address_list: Vec<Address>,
    pub attribute_list: Vec<Attribute>,
    pub urls: Vec<Url>,
    pub lds_ord_list: Vec<LdsOrd>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub person_ref_list: Vec<PersonRef>,
    pub tag_list: Vec<Handle>,
    pub private: bool,
}

impl Person {
    pub fn new(primary_name: Name) -> Self {
        Self {
            primary_name,
            ..Default::default()
        }
    }

    /// Every surname/given-name pair that participates in ordering.
    ///
    /// Patronymic and matronymic surnames are skipped.
    pub fn sort_name(&self) -> String {
        self.primary_name
            .surname_list
            .iter()
            .filter(|s| s.is_sortable())
            .map(|s| format!("{} {}", s.surname, self.primary_name.first_name))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Surname entered into the surname list, if the person has one.
    pub fn list_surname(&self) -> Option<&str> {
        self.primary_name.primary_surname().filter(|s| !s.is_empty())
    }

    pub(crate) fn custom_values(&self, sink: &mut dyn CustomValueSink) {
        record_attributes(&self.attribute_list, RegistryKind::PersonAttributes, sink);
        for eref in &self.event_ref_list {
            eref.role.record_custom(RegistryKind::EventRoles, sink);
        }
        for name in std::iter::once(&self.primary_name).chain(&self.alternate_names) {
            name.name_type.record_custom(RegistryKind::NameTypes, sink);
            for surname in &name.surname_list {
                surname.origin_type.record_custom(RegistryKind::OriginTypes, sink);
            }
        }
        record_urls(&self.urls, sink);
        record_media_attributes(&self.media_list, sink);
    }
}

impl HasReferences for Person {
    fn collect_references(&self, refs: &mut RefCollector) {
        self.primary_name.collect_references(refs);
        refs.walk(&self.alternate_names);
        refs.walk(&self.event_ref_list);
        refs.add_all(ObjectType::Family, &self.family_list);
        refs.add_all(ObjectType::Family, &self.parent_family_list);
        refs.walk(&self.media_list);
        refs.walk(&self.address_list);
        refs.walk(&self.attribute_list);
        refs.walk(&self.lds_ord_list);
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
        refs.walk(&self.person_ref_list);
        refs.add_all(ObjectType::Tag, &self.tag_list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secondary::{CustomType, Surname, PATRONYMIC};

    #[test]
    fn sort_name_skips_patronymics() {
        let mut name = Name::new("Erik", "Larsen");
        let mut patro = Surname::new("Olafsson");
        patro.origin_type = CustomType::standard(PATRONYMIC);
        name.surname_list.push(patro);
        let p = Person::new(name);
        assert_eq!(p.sort_name(), "Larsen Erik");
    }

    #[test]
    fn references_cover_nested_lists() {
        let mut p = Person::new(Name::new("Ada", "Byron"));
        p.family_list.push(Handle::from("f1"));
        p.parent_family_list.push(Handle::from("f2"));
        p.event_ref_list.push(EventRef::new(Handle::from("e1")));
        p.primary_name.citation_list.push(Handle::from("c1"));
        p.tag_list.push(Handle::from("t1"));

        let mut refs = RefCollector::new();
        p.collect_references(&mut refs);
        assert_eq!(refs.len(), 5);
    }

    #[test]
    fn custom_values_are_reported() {
        let mut p = Person::new(Name::new("Ada", "Byron"));
        p.attribute_list
            .push(Attribute::new(CustomType::custom("Shoe size"), "38"));
        p.primary_name.name_type = CustomType::custom("Pen name");
        let mut seen = Vec::new();
        p.custom_values(&mut |k: RegistryKind, v: &str| seen.push((k, v.to_string())));
        assert!(seen.contains(&(RegistryKind::PersonAttributes, "Shoe size".into())));
        assert!(seen.contains(&(RegistryKind::NameTypes, "Pen name".into())));
    }

    #[test]
    fn empty_surname_is_not_listed() {
        let p = Person::new(Name::new("Ada", ""));
        assert_eq!(p.list_surname(), None);
    }
}
