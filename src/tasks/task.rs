//! Task definitions

use crate::config::schema::TaskConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Built-in leaf actions a task can end with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinAction {
    /// Run the test suite with coverage
    Coverage,
    /// Build the multi-arch image without publishing it
    ImageBuild,
    /// Build and publish the multi-arch image
    ImagePush,
    /// Run the release gate
    Release,
}

impl fmt::Display for BuiltinAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Coverage => "coverage",
            Self::ImageBuild => "image-build",
            Self::ImagePush => "image-push",
            Self::Release => "release",
        };
        write!(f, "{}", name)
    }
}

/// One unit of a task's action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Provision a tool
    Ensure(String),
    /// Run a shell command
    Shell(String),
    /// Run a built-in action
    Builtin(BuiltinAction),
}

/// A named, dependency-ordered unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub deps: Vec<String>,
    pub steps: Vec<Step>,
    pub help: Option<String>,
    pub category: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deps: Vec::new(),
            steps: Vec::new(),
            help: None,
            category: None,
            env: BTreeMap::new(),
        }
    }

    pub fn depends_on(mut self, dep: impl Into<String>) -> Self {
        self.deps.push(dep.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build a task from its configuration.
    ///
    /// Step order: tool provisioning, then shell commands, then the
    /// built-in action.
    pub fn from_config(name: &str, config: &TaskConfig) -> Self {
        let steps = config
            .tools
            .iter()
            .cloned()
            .map(Step::Ensure)
            .chain(config.run.iter().cloned().map(Step::Shell))
            .chain(config.action.map(Step::Builtin))
            .collect();

        Self {
            name: name.to_string(),
            deps: config.deps.clone(),
            steps,
            help: config.help.clone(),
            category: config.category.clone(),
            env: config.env.clone(),
        }
    }

    /// Tools this task provisions
    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|s| match s {
            Step::Ensure(tool) => Some(tool.as_str()),
            _ => None,
        })
    }
}
