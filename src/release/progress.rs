//! Release progress persistence
//!
//! Tag existence alone cannot tell a finished release from one that failed
//! half way. The last completed stage is therefore recorded per version so a
//! retry resumes where the previous attempt stopped.

use crate::error::{RiggerError, RiggerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// States of the release state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStage {
    Start,
    TagCheck,
    /// Terminal: the version was already released
    Skipped,
    /// The tag was created by this attempt
    Proceeding,
    TagPushed,
    ChangelogGenerated,
    ReleaseCreated,
    ImagePublished,
    Done,
}

impl ReleaseStage {
    /// The stage reached by completing the next step, if any
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::TagCheck),
            Self::Proceeding => Some(Self::TagPushed),
            Self::TagPushed => Some(Self::ChangelogGenerated),
            Self::ChangelogGenerated => Some(Self::ReleaseCreated),
            Self::ReleaseCreated => Some(Self::ImagePublished),
            Self::ImagePublished => Some(Self::Done),
            Self::TagCheck | Self::Skipped | Self::Done => None,
        }
    }
}

impl fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::TagCheck => "tag-check",
            Self::Skipped => "skipped",
            Self::Proceeding => "proceeding",
            Self::TagPushed => "tag-pushed",
            Self::ChangelogGenerated => "changelog-generated",
            Self::ReleaseCreated => "release-created",
            Self::ImagePublished => "image-published",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Persisted progress of one version's release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseProgress {
    pub version: String,
    pub tag: String,
    /// Last completed stage
    pub stage: ReleaseStage,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReleaseProgress {
    pub fn new(version: &str, tag: &str) -> Self {
        let now = Utc::now();
        Self {
            version: version.to_string(),
            tag: tag.to_string(),
            stage: ReleaseStage::Proceeding,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage == ReleaseStage::Done
    }

    pub fn file_path(dir: &Path, version: &str) -> PathBuf {
        dir.join(format!("{}.json", version))
    }

    /// Load the record for `version`, if any
    pub async fn load(dir: &Path, version: &str) -> RiggerResult<Option<Self>> {
        let path = Self::file_path(dir, version);

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| RiggerError::io(format!("reading release record {}", path.display()), e))?;

        let progress: ReleaseProgress = serde_json::from_str(&content)?;
        Ok(Some(progress))
    }

    /// Record `stage` as completed and persist
    pub async fn advance(&mut self, dir: &Path, stage: ReleaseStage) -> RiggerResult<()> {
        self.stage = stage;
        self.updated_at = Utc::now();
        self.save(dir).await
    }

    pub async fn save(&self, dir: &Path) -> RiggerResult<()> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| RiggerError::io("creating releases directory", e))?;

        let path = Self::file_path(dir, &self.version);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .await
            .map_err(|e| RiggerError::io(format!("writing release record {}", path.display()), e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stages_advance_to_done() {
        let mut stage = ReleaseStage::Proceeding;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(
            seen,
            vec![
                ReleaseStage::Proceeding,
                ReleaseStage::TagPushed,
                ReleaseStage::ChangelogGenerated,
                ReleaseStage::ReleaseCreated,
                ReleaseStage::ImagePublished,
                ReleaseStage::Done,
            ]
        );
        assert_eq!(ReleaseStage::Skipped.next(), None);
    }

    #[tokio::test]
    async fn advance_persists() {
        let dir = TempDir::new().unwrap();
        let mut progress = ReleaseProgress::new("1.2.3", "v1.2.3");

        progress
            .advance(dir.path(), ReleaseStage::ChangelogGenerated)
            .await
            .unwrap();

        let loaded = ReleaseProgress::load(dir.path(), "1.2.3").await.unwrap().unwrap();
        assert_eq!(loaded.stage, ReleaseStage::ChangelogGenerated);
        assert!(!loaded.is_complete());

        let json = std::fs::read_to_string(ReleaseProgress::file_path(dir.path(), "1.2.3")).unwrap();
        assert!(json.contains("changelog-generated"));
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ReleaseProgress::load(dir.path(), "9.9.9").await.unwrap().is_none());
    }
}
