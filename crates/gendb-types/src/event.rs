use serde::{Deserialize, Serialize};

use crate::handle::{GrampsId, Handle};
use crate::object_type::ObjectType;
use crate::reference::{HasReferences, RefCollector};
use crate::registry::{CustomValueSink, RegistryKind};
use crate::secondary::{record_attributes, record_media_attributes, Attribute, CustomType, MediaRef};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub handle: Handle,
    pub gramps_id: GrampsId,
    pub change: i64,
    pub event_type: CustomType,
    pub date: String,
    pub description: String,
    pub place: Option<Handle>,
    pub media_list: Vec<MediaRef>,
    pub attribute_list: Vec<Attribute>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub tag_list: Vec<Handle>,
    pub private: bool,
}

impl Event {
    pub fn new(event_type: CustomType) -> Self {
        Self {
            event_type,
            ..Default::default()
        }
    }

    pub(crate) fn custom_values(&self, sink: &mut dyn CustomValueSink) {
        self.event_type.record_custom(RegistryKind::EventNames, sink);
        record_attributes(&self.attribute_list, RegistryKind::EventAttributes, sink);
        record_media_attributes(&self.media_list, sink);
    }
}

impl HasReferences for Event {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add_opt(ObjectType::Place, self.place.as_ref());
        refs.walk(&self.media_list);
        refs.walk(&self.attribute_list);
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
        refs.add_all(ObjectType::Tag, &self.tag_list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_event_type_is_reported() {
        let ev = Event::new(CustomType::custom("Bar Mitzvah"));
        let mut seen = Vec::new();
        ev.custom_values(&mut |k: RegistryKind, v: &str| seen.push((k, v.to_string())));
        assert_eq!(seen, vec![(RegistryKind::EventNames, "Bar Mitzvah".to_string())]);
    }

    #[test]
    fn place_is_referenced() {
        let mut ev = Event::new(CustomType::standard("Birth"));
        ev.place = Some(Handle::from("pl1"));
        let mut refs = RefCollector::new();
        ev.collect_references(&mut refs);
        let refs = refs.into_refs();
        assert_eq!(refs.len(), 1);
        assert!(refs.iter().all(|r| r.object_type == ObjectType::Place));
    }
}
