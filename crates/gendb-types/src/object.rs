//! The closed set of primary objects and the trait the object store is generic over.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::collate::sort_key;
use crate::event::Event;
use crate::family::Family;
use crate::handle::{GrampsId, Handle, EMPTY_ID};
use crate::media::Media;
use crate::note::{Note, Tag};
use crate::object_type::ObjectType;
use crate::person::Person;
use crate::place::Place;
use crate::reference::{HasReferences, ObjectRef, RefCollector};
use crate::registry::CustomValueSink;
use crate::source::{Citation, Repository, Source};

/// Behaviour shared by the ten primary object structs.
pub trait Primary:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + HasReferences + Send + Sync + 'static
{
    const TYPE: ObjectType;

    fn handle(&self) -> &Handle;
    fn set_handle(&mut self, handle: Handle);

    /// The user-facing id. Always empty for tags.
    fn gramps_id(&self) -> &GrampsId;
    fn set_gramps_id(&mut self, id: GrampsId);

    fn change(&self) -> i64;
    fn set_change(&mut self, change: i64);

    /// Report every custom value in an enum-like field.
    fn record_custom_values(&self, sink: &mut dyn CustomValueSink);

    fn into_object(self) -> PrimaryObject;
    fn from_object(object: PrimaryObject) -> Option<Self>;

    /// Distinct typed references reachable from this object.
    fn referenced_handles(&self) -> BTreeSet<ObjectRef> {
        let mut refs = RefCollector::new();
        self.collect_references(&mut refs);
        refs.into_refs()
    }
}

macro_rules! impl_primary {
    ($ty:ident, id) => {
        impl_primary!(@common $ty);
        impl_primary!(@id $ty);
    };
    ($ty:ident, no_id) => {
        impl_primary!(@common $ty);
        impl_primary!(@no_id $ty);
    };
    (@id $ty:ident) => {
        impl $ty {
            fn id_ref(&self) -> &GrampsId {
                &self.gramps_id
            }

            fn put_id(&mut self, id: GrampsId) {
                self.gramps_id = id;
            }
        }
    };
    (@no_id $ty:ident) => {
        impl $ty {
            fn id_ref(&self) -> &GrampsId {
                &EMPTY_ID
            }

            fn put_id(&mut self, _id: GrampsId) {}
        }
    };
    (@common $ty:ident) => {
        impl Primary for $ty {
            const TYPE: ObjectType = ObjectType::$ty;

            fn handle(&self) -> &Handle {
                &self.handle
            }

            fn set_handle(&mut self, handle: Handle) {
                self.handle = handle;
            }

            fn gramps_id(&self) -> &GrampsId {
                self.id_ref()
            }

            fn set_gramps_id(&mut self, id: GrampsId) {
                self.put_id(id);
            }

            fn change(&self) -> i64 {
                self.change
            }

            fn set_change(&mut self, change: i64) {
                self.change = change;
            }

            fn record_custom_values(&self, sink: &mut dyn CustomValueSink) {
                self.custom_values(sink);
            }

            fn into_object(self) -> PrimaryObject {
                PrimaryObject::$ty(self)
            }

            fn from_object(object: PrimaryObject) -> Option<Self> {
                match object {
                    PrimaryObject::$ty(o) => Some(o),
                    _ => None,
                }
            }
        }
    };
}

impl_primary!(Person, id);
impl_primary!(Family, id);
impl_primary!(Event, id);
impl_primary!(Place, id);
impl_primary!(Source, id);
impl_primary!(Citation, id);
impl_primary!(Media, id);
impl_primary!(Repository, id);
impl_primary!(Note, id);
impl_primary!(Tag, no_id);

/// Any primary object, tagged by its class name when serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PrimaryObject {
    Person(Person),
    Family(Family),
    Event(Event),
    Place(Place),
    Source(Source),
    Citation(Citation),
    Media(Media),
    Repository(Repository),
    Note(Note),
    Tag(Tag),
}

macro_rules! dispatch {
    ($self:expr, $o:ident => $body:expr) => {
        match $self {
            PrimaryObject::Person($o) => $body,
            PrimaryObject::Family($o) => $body,
            PrimaryObject::Event($o) => $body,
            PrimaryObject::Place($o) => $body,
            PrimaryObject::Source($o) => $body,
            PrimaryObject::Citation($o) => $body,
            PrimaryObject::Media($o) => $body,
            PrimaryObject::Repository($o) => $body,
            PrimaryObject::Note($o) => $body,
            PrimaryObject::Tag($o) => $body,
        }
    };
}

impl PrimaryObject {
    /// Which of the ten kinds this object is.
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Person(_) => ObjectType::Person,
            Self::Family(_) => ObjectType::Family,
            Self::Event(_) => ObjectType::Event,
            Self::Place(_) => ObjectType::Place,
            Self::Source(_) => ObjectType::Source,
            Self::Citation(_) => ObjectType::Citation,
            Self::Media(_) => ObjectType::Media,
            Self::Repository(_) => ObjectType::Repository,
            Self::Note(_) => ObjectType::Note,
            Self::Tag(_) => ObjectType::Tag,
        }
    }

    /// Handle of the wrapped object.
    pub fn handle(&self) -> &Handle {
        dispatch!(self, o => o.handle())
    }

    /// User-facing id; empty for tags.
    pub fn gramps_id(&self) -> &GrampsId {
        dispatch!(self, o => o.gramps_id())
    }

    pub fn set_gramps_id(&mut self, id: GrampsId) {
        dispatch!(self, o => o.set_gramps_id(id))
    }

    pub fn change(&self) -> i64 {
        dispatch!(self, o => o.change())
    }

    /// Type and handle of this object.
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.object_type(), self.handle().clone())
    }

    /// Every object this one refers to, through any nested field.
    pub fn referenced_handles(&self) -> BTreeSet<ObjectRef> {
        dispatch!(self, o => o.referenced_handles())
    }

    /// Report the custom type strings this object uses.
    pub fn record_custom_values(&self, sink: &mut dyn CustomValueSink) {
        dispatch!(self, o => o.record_custom_values(sink))
    }

    /// Collation key derived from the object alone.
    ///
    /// Returns `None` for families, whose key comes from a parent and has
    /// to be resolved against the store.
    pub fn order_key(&self) -> Option<String> {
        let text = match self {
            Self::Person(p) => p.sort_name(),
            Self::Family(_) => return None,
            Self::Place(p) => p.sort_title().to_string(),
            Self::Source(s) => s.title.clone(),
            Self::Citation(c) => c.page.clone(),
            Self::Media(m) => m.desc.clone(),
            Self::Tag(t) => t.name.clone(),
            Self::Event(_) | Self::Repository(_) | Self::Note(_) => {
                self.gramps_id().as_str().to_string()
            }
        };
        Some(sort_key(&text))
    }
}

impl HasReferences for PrimaryObject {
    fn collect_references(&self, refs: &mut RefCollector) {
        dispatch!(self, o => o.collect_references(refs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryKind;
    use crate::secondary::{CustomType, Name};
    use proptest::prelude::*;

    #[test]
    fn serialized_form_is_tagged_by_class_name() {
        let mut note = Note::new("hello");
        note.handle = Handle::from("n1");
        let json = serde_json::to_value(note.into_object()).unwrap();
        assert_eq!(json["Note"]["handle"], "n1");
        assert_eq!(json["Note"]["text"], "hello");
    }

    #[test]
    fn from_object_rejects_other_types() {
        let obj = Tag::new("ToDo").into_object();
        assert!(Person::from_object(obj.clone()).is_none());
        assert_eq!(Tag::from_object(obj).unwrap().name, "ToDo");
    }

    #[test]
    fn tags_ignore_ids() {
        let mut tag = Tag::new("ToDo");
        tag.set_gramps_id(GrampsId::from("T0001"));
        assert!(Primary::gramps_id(&tag).is_empty());
    }

    #[test]
    fn family_order_key_is_deferred() {
        assert!(Family::new().into_object().order_key().is_none());
        let p = Person::new(Name::new("Ada", "Byron")).into_object();
        assert_eq!(p.order_key(), Some(sort_key("Byron Ada")));
    }

    #[test]
    fn dispatch_reaches_custom_values() {
        let obj = Event::new(CustomType::custom("Hunt")).into_object();
        let mut seen = Vec::new();
        obj.record_custom_values(&mut |k: RegistryKind, v: &str| seen.push((k, v.to_string())));
        assert_eq!(seen, vec![(RegistryKind::EventNames, "Hunt".to_string())]);
    }

    proptest! {
        #[test]
        fn person_json_round_trip(first in "[A-Za-z]{0,10}", last in "[A-Za-z]{0,10}", hid in "[a-f0-9]{4,20}") {
            let mut p = Person::new(Name::new(first, last));
            p.handle = Handle::from(hid.as_str());
            p.gramps_id = GrampsId::from("I0001");
            let obj = p.into_object();
            let text = serde_json::to_string(&obj).unwrap();
            let back: PrimaryObject = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(back, obj);
        }
    }
}
