//! On-demand tool provisioning
//!
//! A tool is installed once into the tools directory and never checked for
//! version drift afterwards: a file at the install path is proof enough.
//! Installation happens inside a scoped temporary workspace which is removed
//! whether the install succeeds or not.

mod fetch;
mod spec;

pub use fetch::{Fetcher, HttpFetcher};
pub use spec::{expand_url, go_binary_name, ToolSource, ToolSpec};

use crate::config::{Config, Paths};
use crate::error::{RiggerError, RiggerResult};
use crate::exec::{CommandRunner, CommandSpec};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Outcome of [`ToolProvisioner::ensure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    /// The tool was already on disk; nothing was done
    AlreadyPresent(PathBuf),
    /// The tool was built or downloaded just now
    Installed(PathBuf),
}

impl Provisioned {
    pub fn path(&self) -> &Path {
        match self {
            Self::AlreadyPresent(p) | Self::Installed(p) => p,
        }
    }
}

/// Installs tools into a local directory
pub struct ToolProvisioner {
    tools_dir: PathBuf,
    specs: BTreeMap<String, ToolSpec>,
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
}

impl ToolProvisioner {
    pub fn new(tools_dir: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            tools_dir: tools_dir.into(),
            specs: BTreeMap::new(),
            runner,
            fetcher: Arc::new(HttpFetcher),
        }
    }

    /// Provisioner for every tool declared in the configuration
    pub fn from_config(
        config: &Config,
        paths: &Paths,
        runner: Arc<dyn CommandRunner>,
    ) -> RiggerResult<Self> {
        let mut provisioner = Self::new(&paths.tools_dir, runner);
        for (name, tool) in &config.tools {
            provisioner.register(ToolSpec::from_config(name, tool, &paths.tools_dir)?);
        }
        Ok(provisioner)
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn register(&mut self, spec: ToolSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.get(name)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.specs.values()
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    /// Ensure a registered tool by name
    pub async fn ensure_named(&self, name: &str) -> RiggerResult<Provisioned> {
        let spec = self
            .spec(name)
            .ok_or_else(|| RiggerError::UnknownTool(name.to_string()))?;
        self.ensure(spec).await
    }

    /// Program to invoke for `name`: the provisioned path of a declared
    /// tool, otherwise the bare name looked up on PATH
    pub async fn program(&self, name: &str) -> RiggerResult<String> {
        match self.spec(name) {
            Some(spec) => Ok(self.ensure(spec).await?.path().to_string_lossy().to_string()),
            None => Ok(name.to_string()),
        }
    }

    /// Make sure the tool exists at its install path.
    ///
    /// Returns immediately, with no build or network activity, when the
    /// file is already present.
    pub async fn ensure(&self, spec: &ToolSpec) -> RiggerResult<Provisioned> {
        if spec.install_path.is_file() {
            debug!("{} already installed at {}", spec.name, spec.install_path.display());
            return Ok(Provisioned::AlreadyPresent(spec.install_path.clone()));
        }

        info!("Installing {} ({})", spec.name, spec.source.reference());

        fs::create_dir_all(&self.tools_dir).await.map_err(|e| {
            RiggerError::io(format!("creating tools directory {}", self.tools_dir.display()), e)
        })?;

        // Inside the tools dir so the final move is a same-filesystem rename.
        // Removed on drop, on every path out of this function.
        let workspace = tempfile::Builder::new()
            .prefix(".rigger-install-")
            .tempdir_in(&self.tools_dir)
            .map_err(|e| RiggerError::io("creating install workspace", e))?;

        match &spec.source {
            ToolSource::Go { module, version } => {
                self.go_install(spec, workspace.path(), module, version).await?
            }
            ToolSource::Download { url, version } => {
                self.download(spec, workspace.path(), url, version).await?
            }
        }

        if !spec.install_path.is_file() {
            return Err(RiggerError::provision(
                &spec.name,
                format!("no binary produced at {}", spec.install_path.display()),
            ));
        }

        info!("Installed {} to {}", spec.name, spec.install_path.display());
        Ok(Provisioned::Installed(spec.install_path.clone()))
    }

    async fn go_install(
        &self,
        spec: &ToolSpec,
        workspace: &Path,
        module: &str,
        version: &str,
    ) -> RiggerResult<()> {
        // Isolated module so the project's go.mod is left untouched
        let init = CommandSpec::new("go")
            .args(["mod", "init", "tmp"])
            .current_dir(workspace)
            .captured();
        let output = self.runner.run(&init).await?;
        if !output.is_success() {
            return Err(RiggerError::provision(&spec.name, output.error_tail()));
        }

        // Install into the workspace, then move into place, so a failed
        // build never leaves a file at the install path.
        let gobin = workspace.join("bin");
        let install = CommandSpec::new("go")
            .arg("install")
            .arg(format!("{}@{}", module, version))
            .env("GOBIN", gobin.to_string_lossy())
            .current_dir(workspace)
            .captured();
        let output = self.runner.run(&install).await?;
        if !output.is_success() {
            return Err(RiggerError::provision(&spec.name, output.error_tail()));
        }

        let built = gobin.join(go_binary_name(module));
        move_into_place(&spec.name, &built, &spec.install_path).await
    }

    async fn download(
        &self,
        spec: &ToolSpec,
        workspace: &Path,
        url: &str,
        version: &str,
    ) -> RiggerResult<()> {
        let url = expand_url(url, version);
        let staged = workspace.join(&spec.name);

        self.fetcher
            .fetch(&url, &staged)
            .await
            .map_err(|e| RiggerError::provision(&spec.name, e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o755))
                .map_err(|e| RiggerError::io(format!("marking {} executable", spec.name), e))?;
        }

        move_into_place(&spec.name, &staged, &spec.install_path).await
    }

    /// Remove the tools directory and everything in it
    pub async fn clean(&self) -> RiggerResult<bool> {
        if !self.tools_dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&self.tools_dir).await.map_err(|e| {
            RiggerError::io(format!("removing {}", self.tools_dir.display()), e)
        })?;
        info!("Removed {}", self.tools_dir.display());
        Ok(true)
    }
}

async fn move_into_place(tool: &str, staged: &Path, install_path: &Path) -> RiggerResult<()> {
    if !staged.is_file() {
        return Err(RiggerError::provision(
            tool,
            format!("expected binary at {}", staged.display()),
        ));
    }
    fs::rename(staged, install_path).await.map_err(|e| {
        RiggerError::io(format!("moving {} to {}", tool, install_path.display()), e)
    })
}
