use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The ten kinds of primary object.
///
/// Declaration order is the stable order used by full scans such as
/// reference reindexing and cross-backend copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    Person,
    Family,
    Event,
    Place,
    Source,
    Citation,
    Media,
    Repository,
    Note,
    Tag,
}

impl ObjectType {
    /// Every type, in scan order.
    pub const ALL: [ObjectType; 10] = [
        ObjectType::Person,
        ObjectType::Family,
        ObjectType::Event,
        ObjectType::Place,
        ObjectType::Source,
        ObjectType::Citation,
        ObjectType::Media,
        ObjectType::Repository,
        ObjectType::Note,
        ObjectType::Tag,
    ];

    /// Dense index into per-type arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Class name recorded in reference edges (`"Person"`, `"Family"`, ...).
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::Family => "Family",
            Self::Event => "Event",
            Self::Place => "Place",
            Self::Source => "Source",
            Self::Citation => "Citation",
            Self::Media => "Media",
            Self::Repository => "Repository",
            Self::Note => "Note",
            Self::Tag => "Tag",
        }
    }

    /// Lower-case name used for table and metadata key names.
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Family => "family",
            Self::Event => "event",
            Self::Place => "place",
            Self::Source => "source",
            Self::Citation => "citation",
            Self::Media => "media",
            Self::Repository => "repository",
            Self::Note => "note",
            Self::Tag => "tag",
        }
    }

    /// Letter used by the fallback id template (`I%04d` for people).
    ///
    /// Tags are addressed by name and carry no user-facing id.
    pub const fn id_letter(self) -> Option<char> {
        match self {
            Self::Person => Some('I'),
            Self::Family => Some('F'),
            Self::Event => Some('E'),
            Self::Place => Some('P'),
            Self::Source => Some('S'),
            Self::Citation => Some('C'),
            Self::Media => Some('O'),
            Self::Repository => Some('R'),
            Self::Note => Some('N'),
            Self::Tag => None,
        }
    }

    pub const fn has_gramps_id(self) -> bool {
        self.id_letter().is_some()
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

impl FromStr for ObjectType {
    type Err = TypeError;

    /// Accepts the class name in any case, so table names parse too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.class_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypeError::UnknownObjectType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_scan_order() {
        for (i, t) in ObjectType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn parse_accepts_both_spellings() {
        assert_eq!("Person".parse::<ObjectType>().unwrap(), ObjectType::Person);
        assert_eq!("repository".parse::<ObjectType>().unwrap(), ObjectType::Repository);
        assert!("Widget".parse::<ObjectType>().is_err());
    }

    #[test]
    fn only_tag_lacks_an_id() {
        let without: Vec<_> = ObjectType::ALL
            .into_iter()
            .filter(|t| !t.has_gramps_id())
            .collect();
        assert_eq!(without, vec![ObjectType::Tag]);
    }
}
