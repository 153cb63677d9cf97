//! Player identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A player identified by a stable id and the display name last seen for it.
///
/// Equality compares both fields, so two identities sharing an id but carrying
/// different cached names are distinct values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Stable unique id.
    pub id: Uuid,
    /// Cached display name.
    pub name: String,
}

impl Identity {
    /// The "nobody" identity used for unowned regions.
    pub const EMPTY: Self = Self {
        id: Uuid::nil(),
        name: String::new(),
    };

    /// Create an identity.
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Returns true for the empty identity (nil id and empty name).
    pub fn is_empty(&self) -> bool {
        self.id.is_nil() && self.name.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<nobody>")
        } else {
            write!(f, "{} ({})", self.name, self.id)
        }
    }
}
