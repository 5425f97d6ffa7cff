//! Configuration management for rigger

pub mod schema;

pub use schema::Config;

use crate::error::{RiggerError, RiggerResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Project configuration file name
pub const CONFIG_FILE: &str = "rigger.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Locate `rigger.toml` in `start` or any of its ancestors
    pub fn discover(start: &Path) -> RiggerResult<Self> {
        Self::find_local_config(start)
            .map(Self::with_path)
            .ok_or_else(|| RiggerError::ConfigNotFound(start.join(CONFIG_FILE)))
    }

    /// Walk up from `start` looking for a project config file
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load and validate the configuration
    pub async fn load(&self) -> RiggerResult<Config> {
        if !self.config_path.exists() {
            return Err(RiggerError::ConfigNotFound(self.config_path.clone()));
        }

        debug!("Loading config from {}", self.config_path.display());
        let content = fs::read_to_string(&self.config_path).await.map_err(|e| {
            RiggerError::io(
                format!("reading config from {}", self.config_path.display()),
                e,
            )
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| RiggerError::ConfigInvalid {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })?;

        config
            .validate()
            .map_err(|reason| RiggerError::ConfigInvalid {
                path: self.config_path.clone(),
                reason,
            })?;

        Ok(config)
    }

    /// Directory containing the config file; all relative paths resolve here
    pub fn project_root(&self) -> PathBuf {
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Values supplied on the command line or through the environment.
/// These take precedence over `rigger.toml`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub image: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub version: Option<String>,
    pub use_existing_cluster: Option<bool>,
    pub jobs: Option<usize>,
}

impl Config {
    /// Apply command line and environment overrides
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(ref image) = overrides.image {
            self.image.name = image.clone();
        }
        if let Some(ref platforms) = overrides.platforms {
            self.image.platforms = platforms.clone();
        }
        if let Some(ref version) = overrides.version {
            self.release.version = Some(version.clone());
        }
        if let Some(existing) = overrides.use_existing_cluster {
            self.coverage.use_existing_cluster = existing;
        }
        if let Some(jobs) = overrides.jobs {
            self.general.jobs = jobs.max(1);
        }
    }

    /// Override pinned tool versions from `<TOOL_NAME>_VERSION` variables
    pub fn apply_tool_versions<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, tool) in self.tools.iter_mut() {
            if let Some(version) = lookup(&tool_version_var(name)).filter(|v| !v.is_empty()) {
                debug!("Pinning {} to {} from environment", name, version);
                tool.version = version;
            }
        }
    }

    /// Check cross-references that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(format!(
                "general.log_format must be \"text\" or \"json\", got \"{}\"",
                self.general.log_format
            ));
        }

        for (name, tool) in &self.tools {
            match (&tool.module, &tool.url) {
                (Some(_), Some(_)) => {
                    return Err(format!("tool {} sets both module and url", name));
                }
                (None, None) => {
                    return Err(format!("tool {} needs a module or a url", name));
                }
                _ => {}
            }
            if tool.version.is_empty() {
                return Err(format!("tool {} has no pinned version", name));
            }
        }

        for (name, task) in &self.tasks {
            if let Some(tool) = task.tools.iter().find(|t| !self.tools.contains_key(*t)) {
                return Err(format!("task {} uses undeclared tool {}", name, tool));
            }
        }

        Ok(())
    }
}

/// Environment variable pinning a tool's version: `controller-gen` -> `CONTROLLER_GEN_VERSION`
pub fn tool_version_var(tool: &str) -> String {
    let stem: String = tool
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}_VERSION", stem)
}

/// Resolved filesystem locations, passed explicitly into each component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub tools_dir: PathBuf,
    pub state_dir: PathBuf,
    pub coverage_dir: PathBuf,
}

impl Paths {
    /// Resolve configured paths against the project root
    pub fn resolve(root: &Path, config: &schema::PathsConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            tools_dir: root.join(&config.tools_dir),
            state_dir: root.join(&config.state_dir),
            coverage_dir: root.join(&config.coverage_dir),
        }
    }

    /// Release progress records
    pub fn releases_dir(&self) -> PathBuf {
        self.state_dir.join("releases")
    }
}
