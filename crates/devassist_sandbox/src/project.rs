//! Project identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SandboxError, SandboxResult};

/// Maximum length of a project id.
pub const MAX_PROJECT_ID_LEN: usize = 128;

/// Opaque, filesystem-safe project identifier.
///
/// Only ASCII letters, digits, `-` and `_` are accepted, so an id can be used
/// directly as a directory name and never contains separators or dots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Validate and wrap a raw project id.
    pub fn new(raw: impl Into<String>) -> SandboxResult<Self> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw.len() <= MAX_PROJECT_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if !valid {
            return Err(SandboxError::InvalidProjectId(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectId {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProjectId {
    type Error = SandboxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_safe_ids() {
        for raw in ["1", "proj-42", "My_Project", "a1b2c3"] {
            assert!(ProjectId::new(raw).is_ok(), "{} should be valid", raw);
        }
    }

    #[test]
    fn test_rejects_unsafe_ids() {
        for raw in ["", "..", "a/b", "a\\b", "with space", "dot.name", "üni"] {
            assert!(ProjectId::new(raw).is_err(), "{:?} should be rejected", raw);
        }

        let long = "x".repeat(MAX_PROJECT_ID_LEN + 1);
        assert!(ProjectId::new(long).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let id: ProjectId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
        assert!(serde_json::from_str::<ProjectId>("\"../x\"").is_err());
    }
}
