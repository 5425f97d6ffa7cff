//! Test execution with coverage
//!
//! Tests run against a local control plane whose binaries are resolved by the
//! envtest harness. Required bindings are checked before anything runs. The
//! profile is rendered only when the suite passed; a partial profile left by a
//! failing run is kept on disk and reported.

use crate::config::schema::CoverageConfig;
use crate::config::Paths;
use crate::error::{RiggerError, RiggerResult};
use crate::exec::{CommandRunner, CommandSpec};
use crate::tools::ToolProvisioner;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Variable carrying the resolved control plane binaries
pub const ASSETS_VAR: &str = "KUBEBUILDER_ASSETS";

/// Variable telling the suite to target a running cluster
pub const EXISTING_CLUSTER_VAR: &str = "USE_EXISTING_CLUSTER";

const FUNC_REPORT: &str = "cover.txt";
const HTML_REPORT: &str = "cover.html";

/// Files produced by a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageArtifact {
    pub profile: PathBuf,
    pub func_report: Option<PathBuf>,
    pub html_report: Option<PathBuf>,
}

pub struct CoverageRunner {
    runner: Arc<dyn CommandRunner>,
    tools: Arc<ToolProvisioner>,
    config: CoverageConfig,
    paths: Paths,
}

impl CoverageRunner {
    pub fn new(
        config: CoverageConfig,
        paths: Paths,
        runner: Arc<dyn CommandRunner>,
        tools: Arc<ToolProvisioner>,
    ) -> Self {
        Self {
            runner,
            tools,
            config,
            paths,
        }
    }

    pub fn profile_path(&self) -> PathBuf {
        self.paths.coverage_dir.join(&self.config.profile)
    }

    /// Every file a run may leave behind
    pub fn artifact_paths(&self) -> Vec<PathBuf> {
        vec![
            self.profile_path(),
            self.paths.coverage_dir.join(FUNC_REPORT),
            self.paths.coverage_dir.join(HTML_REPORT),
        ]
    }

    /// Test bindings: configured defaults, overridden by `lookup` (normally
    /// the process environment) for every configured or required name
    pub fn bindings<F>(&self, lookup: F) -> BTreeMap<String, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut bindings = self.config.env.clone();
        let names = self
            .config
            .required_env
            .iter()
            .chain(self.config.env.keys())
            .cloned()
            .collect::<Vec<_>>();
        for name in names {
            if let Some(value) = lookup(&name) {
                bindings.insert(name, value);
            }
        }
        bindings
    }

    /// First required binding that is unset or empty
    pub fn missing_binding<'a>(&'a self, bindings: &BTreeMap<String, String>) -> Option<&'a str> {
        self.config
            .required_env
            .iter()
            .find(|name| bindings.get(*name).map_or(true, |v| v.is_empty()))
            .map(String::as_str)
    }

    /// Ask the harness for the configured Kubernetes version's assets
    pub async fn resolve_assets(&self) -> RiggerResult<PathBuf> {
        let harness = self.tools.program(&self.config.harness).await?;
        let spec = CommandSpec::new(harness)
            .args(["use", self.config.k8s_version.as_str(), "--bin-dir"])
            .arg(self.tools.tools_dir().to_string_lossy())
            .args(["-p", "path"])
            .current_dir(&self.paths.root)
            .captured();

        let output = self.runner.run(&spec).await?;
        if !output.is_success() {
            return Err(RiggerError::command_exec(spec.display(), output.error_tail()));
        }

        let assets = output.stdout.trim();
        if assets.is_empty() {
            return Err(RiggerError::command_exec(
                spec.display(),
                "harness returned no asset path",
            ));
        }
        debug!("{}={}", ASSETS_VAR, assets);
        Ok(PathBuf::from(assets))
    }

    /// Check bindings, resolve assets, then run
    pub async fn run_from_env(&self) -> RiggerResult<CoverageArtifact> {
        let bindings = self.bindings(|name| std::env::var(name).ok());
        if let Some(name) = self.missing_binding(&bindings) {
            return Err(RiggerError::MissingTestBinding(name.to_string()));
        }
        let assets = self.resolve_assets().await?;
        self.run(&bindings, &assets).await
    }

    /// Run the suite and render the profile
    pub async fn run(
        &self,
        bindings: &BTreeMap<String, String>,
        assets: &Path,
    ) -> RiggerResult<CoverageArtifact> {
        if let Some(name) = self.missing_binding(bindings) {
            return Err(RiggerError::MissingTestBinding(name.to_string()));
        }

        let (program, args) = self
            .config
            .test_command
            .split_first()
            .ok_or_else(|| RiggerError::User("coverage.test_command is empty".to_string()))?;

        fs::create_dir_all(&self.paths.coverage_dir).await.map_err(|e| {
            RiggerError::io(
                format!("creating coverage directory {}", self.paths.coverage_dir.display()),
                e,
            )
        })?;

        // A profile left by an earlier run must not pass for this run's output
        let profile = self.profile_path();
        match fs::remove_file(&profile).await {
            Ok(()) => debug!("Removed stale profile {}", profile.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RiggerError::io(
                    format!("removing stale profile {}", profile.display()),
                    e,
                ))
            }
        }

        let profile_arg = profile.to_string_lossy().to_string();
        let spec = CommandSpec::new(program.as_str())
            .args(args.iter().map(|a| a.replace("{profile}", &profile_arg)))
            .envs(bindings.clone())
            .env(ASSETS_VAR, assets.to_string_lossy())
            .env(
                EXISTING_CLUSTER_VAR,
                self.config.use_existing_cluster.to_string(),
            )
            .current_dir(&self.paths.root);

        info!("Running tests: {}", spec.display());
        let output = self.runner.run(&spec).await?;
        if !output.is_success() {
            let kept = profile.is_file().then(|| profile.clone());
            if let Some(ref partial) = kept {
                warn!("Partial coverage profile kept at {}", partial.display());
            }
            return Err(RiggerError::TestFailure {
                code: output.code,
                profile: kept,
            });
        }

        let mut artifact = CoverageArtifact {
            profile: profile.clone(),
            func_report: None,
            html_report: None,
        };

        if self.config.func_report {
            artifact.func_report = Some(self.render_func(&profile).await?);
        }
        if self.config.html_report {
            artifact.html_report = Some(self.render_html(&profile).await?);
        }

        Ok(artifact)
    }

    async fn render_func(&self, profile: &Path) -> RiggerResult<PathBuf> {
        let spec = CommandSpec::new("go")
            .args(["tool", "cover"])
            .arg(format!("-func={}", profile.to_string_lossy()))
            .current_dir(&self.paths.root)
            .captured();
        let output = self.runner.run(&spec).await?;
        if !output.is_success() {
            return Err(RiggerError::command_exec(spec.display(), output.error_tail()));
        }

        let report = self.paths.coverage_dir.join(FUNC_REPORT);
        fs::write(&report, &output.stdout)
            .await
            .map_err(|e| RiggerError::io(format!("writing {}", report.display()), e))?;
        if let Some(total) = output.stdout.lines().rev().find(|l| l.starts_with("total")) {
            info!("Coverage {}", total.split_whitespace().last().unwrap_or_default());
        }
        Ok(report)
    }

    async fn render_html(&self, profile: &Path) -> RiggerResult<PathBuf> {
        let report = self.paths.coverage_dir.join(HTML_REPORT);
        let spec = CommandSpec::new("go")
            .args(["tool", "cover"])
            .arg(format!("-html={}", profile.to_string_lossy()))
            .arg("-o")
            .arg(report.to_string_lossy())
            .current_dir(&self.paths.root)
            .captured();
        let output = self.runner.run(&spec).await?;
        if !output.is_success() {
            return Err(RiggerError::command_exec(spec.display(), output.error_tail()));
        }
        Ok(report)
    }
}
