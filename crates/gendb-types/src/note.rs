//! Notes and tags.

use serde::{Deserialize, Serialize};

use crate::handle::{GrampsId, Handle};
use crate::object_type::ObjectType;
use crate::reference::{HasReferences, RefCollector};
use crate::registry::{CustomValueSink, RegistryKind};
use crate::secondary::CustomType;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub handle: Handle,
    pub gramps_id: GrampsId,
    pub change: i64,
    pub text: String,
    pub format: NoteFormat,
    pub note_type: CustomType,
    pub tag_list: Vec<Handle>,
    pub private: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteFormat {
    #[default]
    Flowed,
    Preformatted,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            note_type: CustomType::standard("General"),
            ..Default::default()
        }
    }

    pub(crate) fn custom_values(&self, sink: &mut dyn CustomValueSink) {
        self.note_type.record_custom(RegistryKind::NoteTypes, sink);
    }
}

impl HasReferences for Note {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add_all(ObjectType::Tag, &self.tag_list);
    }
}

/// A named label that other objects carry in their `tag_list`.
///
/// Tags have no user-facing id and are ordered by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub handle: Handle,
    pub change: i64,
    pub name: String,
    pub color: String,
    pub priority: i32,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: "#000000000000".into(),
            ..Default::default()
        }
    }

    pub(crate) fn custom_values(&self, _sink: &mut dyn CustomValueSink) {}
}

impl HasReferences for Tag {
    fn collect_references(&self, _refs: &mut RefCollector) {}
}
