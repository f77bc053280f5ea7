//! Opaque concept identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, globally unique identifier for a [`crate::concept::Concept`].
///
/// Backed by a UUID v4 string. Callers never construct one from raw parts;
/// use [`Oid::new`] or parse one the store handed back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(String);

impl Oid {
    /// Generate a fresh, random OID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// View the OID as a string slice (for storage keys, log fields, etc).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Oid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Oid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Oid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
