//! Source, citation and repository records.

use serde::{Deserialize, Serialize};

use crate::handle::{GrampsId, Handle};
use crate::object_type::ObjectType;
use crate::reference::{HasReferences, RefCollector};
use crate::registry::{CustomValueSink, RegistryKind};
use crate::secondary::{
    record_attributes, record_media_attributes, record_urls, Address, Attribute, CustomType,
    MediaRef, RepoRef, Url,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub handle: Handle,
    pub gramps_id: GrampsId,
    pub change: i64,
    pub title: String,
    pub author: String,
    pub pubinfo: String,
    pub abbrev: String,
    pub reporef_list: Vec<RepoRef>,
    pub attribute_list: Vec<Attribute>,
    pub media_list: Vec<MediaRef>,
    pub note_list: Vec<Handle>,
    pub tag_list: Vec<Handle>,
    pub private: bool,
}

impl Source {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub(crate) fn custom_values(&self, sink: &mut dyn CustomValueSink) {
        record_attributes(&self.attribute_list, RegistryKind::SourceAttributes, sink);
        for reporef in &self.reporef_list {
            reporef
                .media_type
                .record_custom(RegistryKind::SourceMediaTypes, sink);
        }
        record_media_attributes(&self.media_list, sink);
    }
}

impl HasReferences for Source {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.walk(&self.reporef_list);
        refs.walk(&self.attribute_list);
        refs.walk(&self.media_list);
        refs.add_all(ObjectType::Note, &self.note_list);
        refs.add_all(ObjectType::Tag, &self.tag_list);
    }
}

/// A pointer into a source (page, confidence) backing some claim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub handle: Handle,
    pub gramps_id: GrampsId,
    pub change: i64,
    pub source_handle: Option<Handle>,
    pub page: String,
    pub date: String,
    pub confidence: u8,
    pub attribute_list: Vec<Attribute>,
    pub media_list: Vec<MediaRef>,
    pub note_list: Vec<Handle>,
    pub tag_list: Vec<Handle>,
    pub private: bool,
}

impl Citation {
    pub fn new(source: Handle) -> Self {
        Self {
            source_handle: Some(source),
            confidence: 2,
            ..Default::default()
        }
    }

    pub(crate) fn custom_values(&self, sink: &mut dyn CustomValueSink) {
        record_attributes(&self.attribute_list, RegistryKind::SourceAttributes, sink);
        record_media_attributes(&self.media_list, sink);
    }
}

impl HasReferences for Citation {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.add_opt(ObjectType::Source, self.source_handle.as_ref());
        refs.walk(&self.attribute_list);
        refs.walk(&self.media_list);
        refs.add_all(ObjectType::Note, &self.note_list);
        refs.add_all(ObjectType::Tag, &self.tag_list);
    }
}

/// An archive or library holding sources.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub handle: Handle,
    pub gramps_id: GrampsId,
    pub change: i64,
    pub name: String,
    pub repo_type: CustomType,
    pub address_list: Vec<Address>,
    pub urls: Vec<Url>,
    pub note_list: Vec<Handle>,
    pub tag_list: Vec<Handle>,
    pub private: bool,
}

impl Repository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo_type: CustomType::standard("Library"),
            ..Default::default()
        }
    }

    pub(crate) fn custom_values(&self, sink: &mut dyn CustomValueSink) {
        self.repo_type
            .record_custom(RegistryKind::RepositoryTypes, sink);
        record_urls(&self.urls, sink);
    }
}

impl HasReferences for Repository {
    fn collect_references(&self, refs: &mut RefCollector) {
        refs.walk(&self.address_list);
        refs.add_all(ObjectType::Note, &self.note_list);
        refs.add_all(ObjectType::Tag, &self.tag_list);
    }
}
