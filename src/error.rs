//! Error types for rigger
//!
//! All modules use `RiggerResult<T>` as their return type. Outcomes that are
//! "already satisfied" (tag exists, tool present, image published) are not
//! errors; they are values of the component result types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rigger operations
pub type RiggerResult<T> = Result<T, RiggerError>;

/// All errors that can occur in rigger
#[derive(Error, Debug)]
pub enum RiggerError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    // Task graph errors
    #[error("Unknown task: {name}{}", required_by.as_ref().map(|p| format!(" (required by {p})")).unwrap_or_default())]
    UnknownTask {
        name: String,
        required_by: Option<String>,
    },

    #[error("Task defined more than once: {0}")]
    DuplicateTask(String),

    #[error("Dependency cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Task {task} failed: `{command}` exited with {}", display_code(*code))]
    StepFailed {
        task: String,
        command: String,
        code: Option<i32>,
    },

    // Provisioning errors
    #[error("Failed to provision {tool}: {reason}")]
    Provision { tool: String, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    // Test errors
    #[error("Required test environment variable not set: {0}")]
    MissingTestBinding(String),

    #[error("Tests failed (exit {})", display_code(*code))]
    TestFailure {
        code: Option<i32>,
        profile: Option<PathBuf>,
    },

    // Image errors
    #[error("Image build failed for {image}: exit {}", display_code(*code))]
    Build { image: String, code: Option<i32> },

    // Release errors
    #[error("Release step '{step}' failed: {reason}")]
    ReleaseStep {
        step: String,
        reason: String,
        code: Option<i32>,
    },

    #[error("Invalid release version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("No release version given. Pass one or set VERSION")]
    MissingVersion,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    #[error("Interrupted")]
    Interrupted,

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

fn display_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl RiggerError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a provisioning error
    pub fn provision(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Provision {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Create a release step error
    pub fn release_step(step: impl Into<String>, reason: impl Into<String>, code: Option<i32>) -> Self {
        Self::ReleaseStep {
            step: step.into(),
            reason: reason.into(),
            code,
        }
    }

    /// Process exit code for this error.
    ///
    /// Propagates the status of the failing external step when there is one.
    pub fn exit_code(&self) -> u8 {
        let code = match self {
            Self::StepFailed { code, .. }
            | Self::TestFailure { code, .. }
            | Self::Build { code, .. }
            | Self::ReleaseStep { code, .. } => code.unwrap_or(1),
            Self::Interrupted => 130,
            _ => 1,
        };
        u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownTask { .. } => Some("Run: rigger list"),
            Self::Cycle { .. } => Some("Run: rigger check"),
            Self::ConfigNotFound(_) => Some("Create a rigger.toml in the project root"),
            Self::MissingTestBinding(_) => {
                Some("Export the variable or set coverage.env in rigger.toml")
            }
            Self::MissingVersion => Some("Run: rigger release 1.2.3"),
            _ => None,
        }
    }
}
