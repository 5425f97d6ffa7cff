//! Configuration schema for rigger
//!
//! Configuration is stored in `rigger.toml` at the project root.

use crate::tasks::BuiltinAction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Filesystem locations, relative to the project root
    pub paths: PathsConfig,

    /// Container image settings
    pub image: ImageConfig,

    /// Release settings
    pub release: ReleaseConfig,

    /// Test and coverage settings
    pub coverage: CoverageConfig,

    /// Provisioned tools, keyed by binary name
    pub tools: BTreeMap<String, ToolConfig>,

    /// Task definitions, keyed by task name
    pub tasks: BTreeMap<String, TaskConfig>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Maximum concurrently running tasks (1 = sequential)
    pub jobs: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            jobs: 1,
        }
    }
}

/// Filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where provisioned tool binaries are installed
    pub tools_dir: PathBuf,

    /// Where rigger keeps its own state (release progress records)
    pub state_dir: PathBuf,

    /// Where coverage artifacts are written
    pub coverage_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tools_dir: PathBuf::from("bin"),
            state_dir: PathBuf::from(".rigger"),
            coverage_dir: PathBuf::from("."),
        }
    }
}

/// Container image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Image reference built and pushed (IMG)
    pub name: String,

    /// Target platforms (PLATFORMS)
    pub platforms: Vec<String>,

    /// Registry reference used for cache import and export.
    /// Defaults to `<repository>:buildcache`.
    pub cache_ref: Option<String>,

    /// Container CLI
    pub tool: String,

    /// Buildx builder instance name
    pub builder: String,

    /// Dockerfile path
    pub dockerfile: PathBuf,

    /// Build context
    pub context: PathBuf,

    /// Extra build arguments
    pub build_args: BTreeMap<String, String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            name: "controller:latest".to_string(),
            platforms: vec!["linux/amd64".to_string(), "linux/arm64".to_string()],
            cache_ref: None,
            tool: "docker".to_string(),
            builder: "rigger-builder".to_string(),
            dockerfile: PathBuf::from("Dockerfile"),
            context: PathBuf::from("."),
            build_args: BTreeMap::new(),
        }
    }
}

/// Release configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Version to release (VERSION)
    pub version: Option<String>,

    /// Prefix prepended to the version to form the tag name
    pub tag_prefix: String,

    /// Git remote the tag is pushed to (empty = do not push)
    pub remote: String,

    /// Changelog generator command; `{tag}` is substituted.
    /// A program naming a configured tool is provisioned first.
    pub changelog: Vec<String>,

    /// Publish the versioned image as the last release step
    pub publish_image: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            version: None,
            tag_prefix: "v".to_string(),
            remote: "origin".to_string(),
            changelog: vec!["git-chglog".to_string(), "{tag}".to_string()],
            publish_image: true,
        }
    }
}

/// Test and coverage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Test harness tool used to resolve Kubernetes test assets
    pub harness: String,

    /// Kubernetes version of the test assets
    pub k8s_version: String,

    /// Variables that must be bound before tests run
    pub required_env: Vec<String>,

    /// Default values for test environment variables
    pub env: BTreeMap<String, String>,

    /// Test command; `{profile}` is substituted with the profile path
    pub test_command: Vec<String>,

    /// Profile file name, inside `paths.coverage_dir`
    pub profile: String,

    /// Render a function-level summary
    pub func_report: bool,

    /// Render an HTML report
    pub html_report: bool,

    /// Run tests against an already-running cluster (USE_EXISTING_CLUSTER)
    pub use_existing_cluster: bool,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            harness: "setup-envtest".to_string(),
            k8s_version: "1.30.0".to_string(),
            required_env: vec![
                "SOPS_AGE_RECIPIENTS".to_string(),
                "SOPS_AGE_KEY_FILE".to_string(),
            ],
            env: BTreeMap::new(),
            test_command: ["go", "test", "./...", "-coverprofile", "{profile}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            profile: "cover.out".to_string(),
            func_report: true,
            html_report: false,
            use_existing_cluster: false,
        }
    }
}

/// A provisioned tool. Exactly one of `module` or `url` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Go module path built with `go install <module>@<version>`
    pub module: Option<String>,

    /// Download URL; `{version}`, `{os}` and `{arch}` are substituted
    pub url: Option<String>,

    /// Pinned version
    pub version: String,
}

/// A task definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// One-line description; undocumented tasks are hidden from `list`
    pub help: Option<String>,

    /// Listing group
    pub category: Option<String>,

    /// Tasks that must complete first
    pub deps: Vec<String>,

    /// Tools provisioned before the task's commands
    pub tools: Vec<String>,

    /// Shell commands
    pub run: Vec<String>,

    /// Built-in leaf action, runs after the shell commands
    pub action: Option<BuiltinAction>,

    /// Extra environment for this task's commands
    pub env: BTreeMap<String, String>,
}
