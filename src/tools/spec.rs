//! Tool specifications

use crate::config::schema::ToolConfig;
use crate::error::{RiggerError, RiggerResult};
use std::path::{Path, PathBuf};

/// Where a tool comes from, with its pinned version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSource {
    /// `go install <module>@<version>`
    Go { module: String, version: String },
    /// HTTP download of a single binary
    Download { url: String, version: String },
}

impl ToolSource {
    pub fn version(&self) -> &str {
        match self {
            Self::Go { version, .. } | Self::Download { version, .. } => version,
        }
    }

    /// Human-readable source coordinate
    pub fn reference(&self) -> String {
        match self {
            Self::Go { module, version } => format!("{}@{}", module, version),
            Self::Download { url, version } => expand_url(url, version),
        }
    }
}

/// A provisioned tool, identified by its install path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub install_path: PathBuf,
    pub source: ToolSource,
}

impl ToolSpec {
    pub fn go(name: &str, tools_dir: &Path, module: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            install_path: tools_dir.join(name),
            source: ToolSource::Go {
                module: module.to_string(),
                version: version.to_string(),
            },
        }
    }

    pub fn download(name: &str, tools_dir: &Path, url: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            install_path: tools_dir.join(name),
            source: ToolSource::Download {
                url: url.to_string(),
                version: version.to_string(),
            },
        }
    }

    pub fn from_config(name: &str, config: &ToolConfig, tools_dir: &Path) -> RiggerResult<Self> {
        match (&config.module, &config.url) {
            (Some(module), None) => Ok(Self::go(name, tools_dir, module, &config.version)),
            (None, Some(url)) => Ok(Self::download(name, tools_dir, url, &config.version)),
            _ => Err(RiggerError::provision(
                name,
                "exactly one of module or url must be configured",
            )),
        }
    }
}

/// Substitute `{version}`, `{os}` and `{arch}` in a download URL
pub fn expand_url(url: &str, version: &str) -> String {
    url.replace("{version}", version)
        .replace("{os}", std::env::consts::OS)
        .replace("{arch}", go_arch())
}

/// Architecture name as used in Go release artifacts
fn go_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Binary name `go install` produces for a module path.
///
/// A trailing major-version element (`/v5`) is skipped.
pub fn go_binary_name(module: &str) -> &str {
    let mut segments = module.rsplit('/');
    let last = segments.next().unwrap_or(module);
    let is_major = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    if is_major {
        segments.next().unwrap_or(last)
    } else {
        last
    }
}
