use serde::{Deserialize, Serialize};

use crate::handle::{GrampsId, Handle};
use crate::object_type::ObjectType;
use crate::reference::{HasReferences, RefCollector};
use crate::registry::{CustomValueSink, RegistryKind};
use crate::secondary::{record_media_attributes, record_urls, CustomType, MediaRef, PlaceRef, Url};

/// A location, possibly enclosed by other places.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub handle: Handle,
    pub gramps_id: GrampsId,
    pub change: i64,
    pub title: String,
    pub name: String,
    pub alt_names: Vec<String>,
    pub place_type: CustomType,
    pub code: String,
    pub lat: String,
    pub long: String,
    /// Enclosing places.
    pub placeref_list: Vec<PlaceRef>,
    pub urls: Vec<Url>,
    pub media_list: Vec<MediaRef>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub tag_list: Vec<Handle>,
    pub private: bool,
}

impl Place {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Text the place is ordered by: the title, else the name.
    pub fn sort_title(&self) -> &str {
        if self.title.is_empty() {
            &self.name
        } else {
            &self.title
        }
    }

    pub(crate) fn custom_values(&self, sink: &mut dyn CustomValueSink) {
        self.place_type.record_custom(RegistryKind::PlaceTypes, sink);
        record_urls(&self.urls, sink);
        record_media_attributes(&self.media_list, sink);
    }
}

impl HasReferences for Place {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.walk(&self.placeref_list);
        refs.walk(&self.media_list);
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
        refs.add_all(ObjectType::Tag, &self.tag_list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_title_falls_back_to_name() {
        let mut p = Place::new("Oslo");
        assert_eq!(p.sort_title(), "Oslo");
        p.title = "Oslo, Norway".into();
        assert_eq!(p.sort_title(), "Oslo, Norway");
    }

    #[test]
    fn enclosing_places_are_references() {
        let mut p = Place::new("Oslo");
        p.placeref_list.push(PlaceRef {
            ref_handle: Handle::from("no"),
            date: String::new(),
        });
        let mut refs = RefCollector::new();
        p.collect_references(&mut refs);
        assert_eq!(refs.len(), 1);
    }
}
