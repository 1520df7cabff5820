//! # gendb-types
//!
//! The genealogical object model stored by gendb.
//!
//! Ten kinds of primary object (`Person`, `Family`, `Event`, `Place`,
//! `Source`, `Citation`, `Media`, `Repository`, `Note`, `Tag`) are each
//! addressed by an opaque [`Handle`] and, except for tags, carry a
//! user-facing [`GrampsId`]. Objects point at each other only through
//! handles; [`HasReferences`] walks an object, including its nested
//! structures, and yields every handle it holds.
//!
//! This crate has no storage logic. It defines the values that
//! `gendb-store` persists and that `gendb-db` indexes.

pub mod collate;
pub mod error;
pub mod event;
pub mod family;
pub mod handle;
pub mod media;
pub mod note;
pub mod object;
pub mod object_type;
pub mod person;
pub mod place;
pub mod reference;
pub mod registry;
pub mod secondary;
pub mod source;

pub use collate::sort_key;
pub use error::TypeError;
pub use event::Event;
pub use family::Family;
pub use handle::{GrampsId, Handle};
pub use media::Media;
pub use note::{Note, NoteFormat, Tag};
pub use object::{Primary, PrimaryObject};
pub use object_type::ObjectType;
pub use person::Person;
pub use place::Place;
pub use reference::{HasReferences, ObjectRef, RefCollector, ReferenceEdge};
pub use registry::{CustomValueSink, RegistryKind};
pub use secondary::{
    Address, Attribute, ChildRef, CustomType, EventRef, Gender, LdsOrd, MediaRef, Name,
    PersonRef, PlaceRef, RepoRef, Surname, Url,
};
pub use source::{Citation, Repository, Source};
