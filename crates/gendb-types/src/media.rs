use serde::{Deserialize, Serialize};

use crate::handle::{GrampsId, Handle};
use crate::object_type::ObjectType;
use crate::reference::{HasReferences, RefCollector};
use crate::registry::{CustomValueSink, RegistryKind};
use crate::secondary::{record_attributes, Attribute};

/// An external media file (image, document, recording).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub handle: Handle,
    pub gramps_id: GrampsId,
    pub change: i64,
    pub path: String,
    pub mime: String,
    pub desc: String,
    pub checksum: String,
    pub date: String,
    pub attribute_list: Vec<Attribute>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub tag_list: Vec<Handle>,
    pub private: bool,
}

impl Media {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub(crate) fn custom_values(&self, sink: &mut dyn CustomValueSink) {
        record_attributes(&self.attribute_list, RegistryKind::MediaAttributes, sink);
    }
}

impl HasReferences for Media {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.walk(&self.attribute_list);
        refs.add_all(ObjectType::Citation, &self.citation_list);
        refs.add_all(ObjectType::Note, &self.note_list);
        refs.add_all(ObjectType::Tag, &self.tag_list);
    }
}
