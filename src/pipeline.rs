//! Task step execution
//!
//! [`Pipeline`] is the [`TaskExecutor`] used by `rigger run`: it turns each
//! task step into a provisioner call, a shell command, or one of the built-in
//! components.

use crate::config::schema::Config;
use crate::config::Paths;
use crate::coverage::CoverageRunner;
use crate::error::{RiggerError, RiggerResult};
use crate::exec::{CommandRunner, CommandSpec};
use crate::image::{CacheRef, ImageBuilder};
use crate::release::{ReleaseGate, ReleaseOutcome};
use crate::tasks::{BuiltinAction, Step, Task, TaskExecutor};
use crate::tools::ToolProvisioner;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Pipeline {
    config: Config,
    paths: Paths,
    runner: Arc<dyn CommandRunner>,
    tools: Arc<ToolProvisioner>,
    images: Arc<ImageBuilder>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        paths: Paths,
        runner: Arc<dyn CommandRunner>,
        tools: Arc<ToolProvisioner>,
    ) -> Self {
        let images = Arc::new(ImageBuilder::new(&config.image, &paths, runner.clone()));
        Self {
            config,
            paths,
            runner,
            tools,
            images,
        }
    }

    pub fn from_config(config: Config, paths: Paths, runner: Arc<dyn CommandRunner>) -> RiggerResult<Self> {
        let tools = Arc::new(ToolProvisioner::from_config(&config, &paths, runner.clone())?);
        Ok(Self::new(config, paths, runner, tools))
    }

    pub fn tools(&self) -> &Arc<ToolProvisioner> {
        &self.tools
    }

    pub fn images(&self) -> &Arc<ImageBuilder> {
        &self.images
    }

    pub fn coverage(&self) -> CoverageRunner {
        CoverageRunner::new(
            self.config.coverage.clone(),
            self.paths.clone(),
            self.runner.clone(),
            self.tools.clone(),
        )
    }

    pub fn release_gate(&self) -> ReleaseGate {
        ReleaseGate::new(
            self.config.release.clone(),
            self.config.image.clone(),
            self.paths.clone(),
            self.runner.clone(),
            self.tools.clone(),
            self.images.clone(),
        )
    }

    pub fn cache(&self) -> CacheRef {
        CacheRef::for_image(
            &self.config.image.name,
            self.config.image.cache_ref.as_deref(),
            self.config.image.platforms.clone(),
        )
    }

    /// Variables exported to every shell step
    pub fn exported_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("IMG".to_string(), self.config.image.name.clone());
        env.insert("PLATFORMS".to_string(), self.config.image.platforms.join(","));
        env.insert(
            "USE_EXISTING_CLUSTER".to_string(),
            self.config.coverage.use_existing_cluster.to_string(),
        );
        if let Some(ref version) = self.config.release.version {
            env.insert("VERSION".to_string(), version.clone());
        }
        env.insert(
            "LOCALBIN".to_string(),
            self.paths.tools_dir.to_string_lossy().to_string(),
        );
        env
    }

    /// PATH with the tools directory first
    fn search_path(&self) -> String {
        let mut dirs = vec![self.paths.tools_dir.clone()];
        if let Some(path) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&path));
        }
        std::env::join_paths(dirs)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| self.paths.tools_dir.to_string_lossy().to_string())
    }

    async fn shell(&self, task: &Task, command: &str) -> RiggerResult<()> {
        let spec = CommandSpec::shell(command)
            .envs(self.exported_env())
            .envs(task.env.clone())
            .env("PATH", self.search_path())
            .current_dir(&self.paths.root);

        info!("[{}] {}", task.name, command);
        let output = self.runner.run(&spec).await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(RiggerError::StepFailed {
                task: task.name.clone(),
                command: command.to_string(),
                code: output.code,
            })
        }
    }

    async fn builtin(&self, action: BuiltinAction) -> RiggerResult<()> {
        match action {
            BuiltinAction::Coverage => {
                let artifact = self.coverage().run_from_env().await?;
                info!("Coverage profile written to {}", artifact.profile.display());
            }
            BuiltinAction::ImageBuild => {
                self.images
                    .build(&self.config.image.name, &self.cache(), false)
                    .await?;
            }
            // Always pushes; only releases refuse to overwrite
            BuiltinAction::ImagePush => {
                self.images
                    .build(&self.config.image.name, &self.cache(), true)
                    .await?;
                info!("Pushed {}", self.config.image.name);
            }
            BuiltinAction::Release => {
                let version = self
                    .config
                    .release
                    .version
                    .as_deref()
                    .ok_or(RiggerError::MissingVersion)?;
                match self.release_gate().run(version).await? {
                    ReleaseOutcome::Skipped { tag } => info!("{} already released", tag),
                    ReleaseOutcome::Released { tag, .. } => info!("Released {}", tag),
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TaskExecutor for Pipeline {
    async fn execute(&self, task: &Task) -> RiggerResult<()> {
        for step in &task.steps {
            debug!("[{}] step {:?}", task.name, step);
            match step {
                Step::Ensure(tool) => {
                    self.tools.ensure_named(tool).await?;
                }
                Step::Shell(command) => self.shell(task, command).await?,
                Step::Builtin(action) => self.builtin(*action).await?,
            }
        }
        Ok(())
    }
}
