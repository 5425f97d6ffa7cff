//! Release gate
//!
//! `Start -> TagCheck -> {Skipped | Proceeding} -> TagPushed ->
//! ChangelogGenerated -> ReleaseCreated -> ImagePublished -> Done`
//!
//! Creating the tag is the gate: if it already exists the version counts as
//! released and nothing else happens, unless a progress record shows an
//! earlier attempt stopped part way, in which case the release resumes after
//! the last completed stage. Nothing is rolled back on failure.

mod progress;
mod version;

pub use progress::{ReleaseProgress, ReleaseStage};
pub use version::ReleaseVersion;

use crate::config::schema::{ImageConfig, ReleaseConfig};
use crate::config::Paths;
use crate::error::{RiggerError, RiggerResult};
use crate::exec::{CommandRunner, CommandSpec};
use crate::image::{with_tag, CacheRef, ImageBuilder, PushOutcome};
use crate::tools::ToolProvisioner;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

/// Tag namespace state for a version, computed fresh at every attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseState {
    pub version: ReleaseVersion,
    pub tag_exists: bool,
}

/// How a release attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The tag already existed and no unfinished attempt was recorded
    Skipped { tag: String },
    /// All stages completed
    Released {
        tag: String,
        /// Stage an earlier, interrupted attempt had reached
        resumed_from: Option<ReleaseStage>,
        image: Option<PushOutcome>,
    },
}

/// Drives a version through tagging, changelog, release and image publish
pub struct ReleaseGate {
    runner: Arc<dyn CommandRunner>,
    tools: Arc<ToolProvisioner>,
    images: Arc<ImageBuilder>,
    config: ReleaseConfig,
    image: ImageConfig,
    paths: Paths,
}

impl ReleaseGate {
    pub fn new(
        config: ReleaseConfig,
        image: ImageConfig,
        paths: Paths,
        runner: Arc<dyn CommandRunner>,
        tools: Arc<ToolProvisioner>,
        images: Arc<ImageBuilder>,
    ) -> Self {
        Self {
            runner,
            tools,
            images,
            config,
            image,
            paths,
        }
    }

    fn git(&self) -> CommandSpec {
        // Tag detection reads git's stderr, which must not be translated
        CommandSpec::new("git")
            .env("LC_ALL", "C")
            .current_dir(&self.paths.root)
            .captured()
    }

    fn changelog_path(&self, version: &ReleaseVersion) -> PathBuf {
        self.paths
            .releases_dir()
            .join(format!("{}.changelog.md", version))
    }

    /// Release `raw_version`
    pub async fn run(&self, raw_version: &str) -> RiggerResult<ReleaseOutcome> {
        let version = ReleaseVersion::parse(raw_version, &self.config.tag_prefix)?;
        let dir = self.paths.releases_dir();
        let tag = version.tag().to_string();

        let state = self.tag_check(&version).await?;

        let (mut progress, resumed_from) = if state.tag_exists {
            match ReleaseProgress::load(&dir, &version.to_string()).await? {
                Some(progress) if !progress.is_complete() => {
                    warn!(
                        "Tag {} exists but release stopped after {}; resuming",
                        tag, progress.stage
                    );
                    let stage = progress.stage;
                    (progress, Some(stage))
                }
                _ => {
                    warn!("Tag {} already exists; skipping release", tag);
                    return Ok(ReleaseOutcome::Skipped { tag });
                }
            }
        } else {
            info!("Created tag {}", tag);
            let progress = ReleaseProgress::new(&version.to_string(), &tag);
            progress.save(&dir).await?;
            (progress, None)
        };

        let mut image = None;
        while let Some(next) = progress.stage.next() {
            match next {
                ReleaseStage::TagPushed => self.push_tag(&version).await?,
                ReleaseStage::ChangelogGenerated => self.generate_changelog(&version).await?,
                ReleaseStage::ReleaseCreated => self.create_release(&version).await?,
                ReleaseStage::ImagePublished => image = self.publish_image(&version).await?,
                _ => {}
            }
            progress.advance(&dir, next).await?;
            info!("Release {}: {}", tag, next);
        }

        Ok(ReleaseOutcome::Released {
            tag,
            resumed_from,
            image,
        })
    }

    /// Try to create the tag; its prior existence is the "already released" signal
    pub async fn tag_check(&self, version: &ReleaseVersion) -> RiggerResult<ReleaseState> {
        let spec = self.git().args(["tag", version.tag()]);
        let output = self.runner.run(&spec).await?;

        if output.is_success() {
            return Ok(ReleaseState {
                version: version.clone(),
                tag_exists: false,
            });
        }

        if output.stderr.contains("already exists") {
            return Ok(ReleaseState {
                version: version.clone(),
                tag_exists: true,
            });
        }

        Err(RiggerError::release_step(
            ReleaseStage::TagCheck.to_string(),
            output.error_tail(),
            output.code,
        ))
    }

    async fn push_tag(&self, version: &ReleaseVersion) -> RiggerResult<()> {
        if self.config.remote.is_empty() {
            return Ok(());
        }
        let spec = self
            .git()
            .args(["push", self.config.remote.as_str(), version.tag()]);
        let output = self.runner.run(&spec).await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(RiggerError::release_step(
                ReleaseStage::TagPushed.to_string(),
                output.error_tail(),
                output.code,
            ))
        }
    }

    /// Run the changelog generator scoped to the new tag and store its output
    async fn generate_changelog(&self, version: &ReleaseVersion) -> RiggerResult<()> {
        let step = ReleaseStage::ChangelogGenerated.to_string();
        let (program, args) = self
            .config
            .changelog
            .split_first()
            .ok_or_else(|| RiggerError::release_step(&step, "release.changelog is empty", None))?;

        let program = self.tools.program(program).await?;

        let spec = CommandSpec::new(program)
            .args(args.iter().map(|a| a.replace("{tag}", version.tag())))
            .current_dir(&self.paths.root)
            .captured();
        let output = self.runner.run(&spec).await?;
        if !output.is_success() {
            return Err(RiggerError::release_step(&step, output.error_tail(), output.code));
        }

        let path = self.changelog_path(version);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RiggerError::io("creating releases directory", e))?;
        }
        fs::write(&path, &output.stdout)
            .await
            .map_err(|e| RiggerError::io(format!("writing changelog {}", path.display()), e))?;
        Ok(())
    }

    async fn create_release(&self, version: &ReleaseVersion) -> RiggerResult<()> {
        let notes = self.changelog_path(version);
        let mut spec = CommandSpec::new("gh")
            .args(["release", "create", version.tag(), "--title", version.tag()])
            .arg("--notes-file")
            .arg(notes.to_string_lossy())
            .current_dir(&self.paths.root)
            .captured();
        if version.is_prerelease() {
            spec = spec.arg("--prerelease");
        }

        let output = self.runner.run(&spec).await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(RiggerError::release_step(
                ReleaseStage::ReleaseCreated.to_string(),
                output.error_tail(),
                output.code,
            ))
        }
    }

    async fn publish_image(&self, version: &ReleaseVersion) -> RiggerResult<Option<PushOutcome>> {
        if !self.config.publish_image {
            return Ok(None);
        }
        let reference = with_tag(&self.image.name, &version.to_string());
        let cache = CacheRef::for_image(
            &self.image.name,
            self.image.cache_ref.as_deref(),
            self.image.platforms.clone(),
        );
        let outcome = self.images.publish(&reference, &cache).await?;
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PathsConfig;
    use crate::exec::testing::ScriptedRunner;
    use crate::exec::CommandOutput;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        paths: Paths,
        runner: Arc<ScriptedRunner>,
        gate: ReleaseGate,
    }

    /// A repository with `existing` tags and a registry
    fn fixture(existing: &[&str], gh_fails: Arc<AtomicBool>, chglog_fails: bool) -> Fixture {
        let root = TempDir::new().unwrap();
        let paths = Paths::resolve(root.path(), &PathsConfig::default());
        let tags: Arc<Mutex<HashSet<String>>> =
            Arc::new(Mutex::new(existing.iter().map(|t| t.to_string()).collect()));

        let (registry, _) = crate::image::tests::registry(&[]);
        let runner = registry
            .on(move |spec| {
                if spec.program != "git" || spec.args.first().map(String::as_str) != Some("tag") {
                    return None;
                }
                let tag = spec.args[1].clone();
                let mut tags = tags.lock().unwrap();
                if tags.contains(&tag) {
                    Some(CommandOutput::failure(
                        128,
                        format!("fatal: tag '{}' already exists", tag),
                    ))
                } else {
                    tags.insert(tag);
                    Some(CommandOutput::success())
                }
            })
            .on(move |spec| {
                (spec.program == "git-chglog").then(|| {
                    if chglog_fails {
                        CommandOutput::failure(1, "no commits")
                    } else {
                        CommandOutput::success().with_stdout(format!("## {}\n- fixes\n", spec.args[0]))
                    }
                })
            })
            .on(move |spec| {
                (spec.program == "gh" && gh_fails.load(Ordering::SeqCst))
                    .then(|| CommandOutput::failure(1, "HTTP 502"))
            });
        let runner = Arc::new(runner);

        let image = ImageConfig {
            name: "ghcr.io/acme/op:latest".into(),
            ..ImageConfig::default()
        };
        let tools = Arc::new(ToolProvisioner::new(&paths.tools_dir, runner.clone()));
        let images = Arc::new(ImageBuilder::new(&image, &paths, runner.clone()));
        let gate = ReleaseGate::new(
            ReleaseConfig::default(),
            image,
            paths.clone(),
            runner.clone(),
            tools,
            images,
        );

        Fixture {
            _root: root,
            paths,
            runner,
            gate,
        }
    }

    fn ok() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[tokio::test]
    async fn first_release_runs_every_stage() {
        let fx = fixture(&[], ok(), false);

        let outcome = fx.gate.run("1.2.3").await.unwrap();

        assert_eq!(
            outcome,
            ReleaseOutcome::Released {
                tag: "v1.2.3".into(),
                resumed_from: None,
                image: Some(PushOutcome::Pushed("ghcr.io/acme/op:1.2.3".into())),
            }
        );

        let commands = fx.runner.commands();
        let position = |needle: &str| commands.iter().position(|c| c.contains(needle)).unwrap();
        assert!(position("git tag v1.2.3") < position("git push origin v1.2.3"));
        assert!(position("git push origin") < position("git-chglog v1.2.3"));
        assert!(position("git-chglog") < position("gh release create v1.2.3"));
        assert!(position("gh release create") < position("--push"));

        let notes = std::fs::read_to_string(fx.paths.releases_dir().join("1.2.3.changelog.md")).unwrap();
        assert!(notes.starts_with("## v1.2.3"));

        let record = ReleaseProgress::load(&fx.paths.releases_dir(), "1.2.3")
            .await
            .unwrap()
            .unwrap();
        assert!(record.is_complete());
    }

    #[tokio::test]
    async fn repeated_release_is_skipped() {
        let fx = fixture(&[], ok(), false);

        fx.gate.run("1.2.3").await.unwrap();
        let calls_after_first = fx.runner.calls().len();

        for _ in 0..2 {
            let outcome = fx.gate.run("v1.2.3").await.unwrap();
            assert_eq!(outcome, ReleaseOutcome::Skipped { tag: "v1.2.3".into() });
        }

        // Only the two tag attempts were added
        let new: Vec<String> = fx.runner.commands()[calls_after_first..].to_vec();
        assert_eq!(new, vec!["git tag v1.2.3", "git tag v1.2.3"]);
    }

    #[tokio::test]
    async fn existing_tag_skips_without_side_effects() {
        let fx = fixture(&["v1.2.3"], ok(), false);

        let outcome = fx.gate.run("1.2.3").await.unwrap();

        assert_eq!(outcome, ReleaseOutcome::Skipped { tag: "v1.2.3".into() });
        assert_eq!(fx.runner.commands(), vec!["git tag v1.2.3"]);
        assert_eq!(fx.runner.count_matching("git-chglog"), 0);
        assert_eq!(fx.runner.count_matching("gh release"), 0);
        assert_eq!(fx.runner.count_matching("buildx"), 0);
    }

    #[tokio::test]
    async fn failed_release_resumes_on_retry() {
        let gh_fails = Arc::new(AtomicBool::new(true));
        let fx = fixture(&[], gh_fails.clone(), false);

        let err = fx.gate.run("1.2.3").await.unwrap_err();
        assert!(matches!(
            err,
            RiggerError::ReleaseStep { ref step, .. } if step == "release-created"
        ));
        let record = ReleaseProgress::load(&fx.paths.releases_dir(), "1.2.3")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.stage, ReleaseStage::ChangelogGenerated);

        gh_fails.store(false, Ordering::SeqCst);
        let outcome = fx.gate.run("1.2.3").await.unwrap();

        assert!(matches!(
            outcome,
            ReleaseOutcome::Released {
                resumed_from: Some(ReleaseStage::ChangelogGenerated),
                ..
            }
        ));
        assert_eq!(fx.runner.count_matching("git-chglog"), 1);
        assert_eq!(fx.runner.count_matching("gh release create"), 2);
        assert_eq!(fx.runner.count_matching("--push"), 1);
    }

    #[tokio::test]
    async fn changelog_failure_is_fatal_and_keeps_tag() {
        let fx = fixture(&[], ok(), true);

        let err = fx.gate.run("2.0.0").await.unwrap_err();

        assert!(matches!(
            err,
            RiggerError::ReleaseStep { ref step, code: Some(1), .. } if step == "changelog-generated"
        ));
        assert_eq!(fx.runner.count_matching("gh release"), 0);
        let record = ReleaseProgress::load(&fx.paths.releases_dir(), "2.0.0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.stage, ReleaseStage::TagPushed);
    }

    #[tokio::test]
    async fn invalid_version_has_no_side_effects() {
        let fx = fixture(&[], ok(), false);
        let err = fx.gate.run("next").await.unwrap_err();
        assert!(matches!(err, RiggerError::InvalidVersion { .. }));
        assert!(fx.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn tag_check_other_failure_is_fatal() {
        let root = TempDir::new().unwrap();
        let paths = Paths::resolve(root.path(), &PathsConfig::default());
        let runner = Arc::new(ScriptedRunner::new().on(|spec| {
            (spec.program == "git")
                .then(|| CommandOutput::failure(128, "fatal: not a git repository"))
        }));
        let image = ImageConfig::default();
        let gate = ReleaseGate::new(
            ReleaseConfig::default(),
            image.clone(),
            paths.clone(),
            runner.clone(),
            Arc::new(ToolProvisioner::new(&paths.tools_dir, runner.clone())),
            Arc::new(ImageBuilder::new(&image, &paths, runner.clone())),
        );

        let err = gate.run("1.0.0").await.unwrap_err();
        assert!(matches!(err, RiggerError::ReleaseStep { ref step, code: Some(128), .. } if step == "tag-check"));
        assert_eq!(err.exit_code(), 128);
    }

    #[tokio::test]
    async fn git_runs_untranslated() {
        let fx = fixture(&["v1.2.3"], ok(), false);

        fx.gate.run("1.2.3").await.unwrap();

        let tag = &fx.runner.calls()[0];
        assert_eq!(tag.program, "git");
        assert_eq!(tag.env.get("LC_ALL").map(String::as_str), Some("C"));
    }

    #[tokio::test]
    async fn prerelease_flagged_on_github() {
        let fx = fixture(&[], ok(), false);
        fx.gate.run("1.3.0-rc.1").await.unwrap();
        assert_eq!(fx.runner.count_matching("--prerelease"), 1);
    }
}
