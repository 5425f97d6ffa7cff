//! Command line interface

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};

use crate::config::{Config, ConfigManager, Overrides, Paths};
use crate::error::{RiggerError, RiggerResult};
use crate::exec::SystemRunner;
use crate::pipeline::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Loaded project: configuration with overrides applied and resolved paths
pub struct Workspace {
    pub config: Config,
    pub paths: Paths,
    pub config_path: PathBuf,
}

impl Workspace {
    /// Find and load `rigger.toml`, then apply flag and environment overrides
    pub async fn load(cli: &Cli) -> RiggerResult<Self> {
        let manager = match cli.config {
            Some(ref path) => ConfigManager::with_path(path.clone()),
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|e| RiggerError::io("getting current directory", e))?;
                ConfigManager::discover(&cwd)?
            }
        };
        debug!("Using config {}", manager.path().display());

        let mut config = manager.load().await?;
        config.apply_overrides(&Overrides {
            image: cli.img.clone(),
            platforms: cli.platforms.clone(),
            version: cli.release_version.clone(),
            use_existing_cluster: cli.use_existing_cluster,
            jobs: match cli.command {
                Commands::Run(ref args) => args.jobs,
                _ => None,
            },
        });
        config.apply_tool_versions(|var| std::env::var(var).ok());

        let paths = Paths::resolve(&manager.project_root(), &config.paths);
        Ok(Self {
            config,
            paths,
            config_path: manager.path().to_path_buf(),
        })
    }

    /// Executor wired to real processes
    pub fn pipeline(&self) -> RiggerResult<Pipeline> {
        Pipeline::from_config(
            self.config.clone(),
            self.paths.clone(),
            Arc::new(SystemRunner),
        )
    }
}
