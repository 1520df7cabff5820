use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque, immutable identifier of a primary object.
///
/// A `Handle` is assigned once when an object is first added and is the only
/// key objects use to point at each other. It is never derived from content
/// and never reused. Imports may supply pre-existing handles, so any
/// non-empty string without whitespace is accepted.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// Generate a fresh handle.
    ///
    /// The layout is 12 hex digits of microseconds since the epoch followed
    /// by 8 random hex digits, which keeps handles created in one session
    /// roughly time-ordered. Callers that need a collision-free handle probe
    /// the store and regenerate on a hit.
    pub fn generate() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;
        let mut random = [0u8; 4];
        rand::Rng::fill(&mut rand::thread_rng(), &mut random);
        Self(format!(
            "{:012x}{}",
            micros & 0xffff_ffff_ffff,
            hex::encode(random)
        ))
    }

    /// Wrap an existing handle string, rejecting empty or whitespace-bearing values.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidHandle(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Wrap a string without validation (used when reading trusted rows).
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty handle means "not yet assigned".
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if this handle may be stored as a reference target.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && !self.0.chars().any(char::is_whitespace)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Handle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Handle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shared empty id, returned by types that carry no user-facing id.
pub(crate) static EMPTY_ID: GrampsId = GrampsId(String::new());

/// User-facing identifier, unique within one object type (e.g. `I0042`).
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrampsId(String);

impl GrampsId {
    /// Wrap an id string as given.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for GrampsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrampsId({})", self.0)
    }
}

impl fmt::Display for GrampsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GrampsId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GrampsId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for GrampsId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_handles_are_distinct() {
        let handles: HashSet<Handle> = (0..1000).map(|_| Handle::generate()).collect();
        assert_eq!(handles.len(), 1000);
    }

    #[test]
    fn generated_handle_shape() {
        let h = Handle::generate();
        assert_eq!(h.as_str().len(), 20);
        assert!(h.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(h.is_valid());
    }

    #[test]
    fn parse_rejects_empty_and_whitespace() {
        assert!(Handle::parse("").is_err());
        assert!(Handle::parse("a b").is_err());
        assert_eq!(Handle::parse("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn serde_is_transparent() {
        let h = Handle::from("f00d");
        assert_eq!(serde_json::to_string(&h).unwrap(), "\"f00d\"");
        let id = GrampsId::from("I0001");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"I0001\"");
    }

    #[test]
    fn gramps_id_compares_with_str() {
        assert_eq!(GrampsId::from("I0000"), "I0000");
    }
}
