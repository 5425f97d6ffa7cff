//! Release version parsing

use crate::error::{RiggerError, RiggerResult};
use std::fmt;

/// A validated release version and the tag it maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion {
    version: semver::Version,
    tag: String,
}

impl ReleaseVersion {
    /// Parse `raw` (an optional leading `v` is accepted) and derive the tag
    pub fn parse(raw: &str, tag_prefix: &str) -> RiggerResult<Self> {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let version = semver::Version::parse(bare).map_err(|e| RiggerError::InvalidVersion {
            version: raw.to_string(),
            reason: e.to_string(),
        })?;
        let tag = format!("{}{}", tag_prefix, version);
        Ok(Self { version, tag })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}
