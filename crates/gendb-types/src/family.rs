use serde::{Deserialize, Serialize};

use crate::handle::{GrampsId, Handle};
use crate::object_type::ObjectType;
use crate::reference::{HasReferences, RefCollector};
use crate::registry::{CustomValueSink, RegistryKind};
use crate::secondary::{
    record_attributes, record_media_attributes, Attribute, ChildRef, CustomType, EventRef,
    LdsOrd, MediaRef,
};

/// A couple and their children.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub handle: Handle,
    pub gramps_id: GrampsId,
    pub change: i64,
    pub father_handle: Option<Handle>,
    pub mother_handle: Option<Handle>,
    pub child_ref_list: Vec<ChildRef>,
    pub family_rel: CustomType,
    pub event_ref_list: Vec<EventRef>,
    pub media_list: Vec<MediaRef>,
    pub attribute_list: Vec<Attribute>,
    pub lds_ord_list: Vec<LdsOrd>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub tag_list: Vec<Handle>,
    pub private: bool,
}

impl Family {
    pub fn new() -> Self {
        Self {
            family_rel: CustomType::standard("Married"),
            ..Default::default()
        }
    }

    /// The parent whose name orders the family: father, else mother.
    pub fn ordering_parent(&self) -> Option<&Handle> {
        self.father_handle
            .as_ref()
            .filter(|h| !h.is_empty())
            .or(self.mother_handle.as_ref().filter(|h| !h.is_empty()))
    }

    pub(crate) fn custom_values(&self, sink: &mut dyn CustomValueSink) {
        record_attributes(&self.attribute_list, RegistryKind::FamilyAttributes, sink);
        for cref in &self.child_ref_list {
            cref.frel.record_custom(RegistryKind::ChildRefTypes, sink);
            cref.mrel.record_custom(RegistryKind::ChildRefTypes, sink);
        }
        for eref in &self.event_ref_list {
            eref.role.record_custom(RegistryKind::EventRoles, sink);
        }
        self.family_rel
            .record_custom(RegistryKind::FamilyRelTypes, sink);
        record_media_attributes(&self.media_list, sink);
    }
}

impl HasReferences for Family {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add_opt(ObjectType::Person, self.father_handle.as_ref());
        refs.add_opt(ObjectType::Person, self.mother_handle.as_ref());
        refs.walk(&self.child_ref_list);
        refs.walk(&self.event_ref_list);
        refs.walk(&self.media_list);
        refs.walk(&self.attribute_list);
        refs.walk(&self.lds_ord_list);
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
        refs.add_all(ObjectType::Tag, &self.tag_list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_parent_prefers_father() {
        let mut f = Family::new();
        assert_eq!(f.ordering_parent(), None);
        f.mother_handle = Some(Handle::from("m"));
        assert_eq!(f.ordering_parent(), Some(&Handle::from("m")));
        f.father_handle = Some(Handle::from("p"));
        assert_eq!(f.ordering_parent(), Some(&Handle::from("p")));
    }

    #[test]
    fn parents_and_children_are_person_refs() {
        let mut f = Family::new();
        f.father_handle = Some(Handle::from("p1"));
        f.child_ref_list.push(ChildRef::new(Handle::from("p2")));
        let mut refs = RefCollector::new();
        f.collect_references(&mut refs);
        let refs = refs.into_refs();
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.object_type == ObjectType::Person));
    }
}
