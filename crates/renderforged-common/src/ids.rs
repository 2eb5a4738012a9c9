//! Typed render job identifier.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a render job.
///
/// Opaque to callers: it is generated from a v4 UUID but any string received
/// over the API is accepted for lookups, so unknown ids surface as
/// "not found" rather than as parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderId(String);

impl RenderId {
    /// Generate a new random render ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RenderId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for RenderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RenderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for RenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
