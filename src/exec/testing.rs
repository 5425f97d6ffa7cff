//! Scripted command runner for unit tests

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::RiggerResult;
use async_trait::async_trait;
use std::sync::Mutex;

type Handler = Box<dyn Fn(&CommandSpec) -> Option<CommandOutput> + Send + Sync>;

/// Records every command and answers from registered handlers.
///
/// Handlers are consulted in registration order; the first one returning
/// `Some` wins. Unmatched commands succeed with empty output.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    calls: Mutex<Vec<CommandSpec>>,
    handlers: Vec<Handler>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> Option<CommandOutput> + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Fail any command whose display line contains `needle`
    pub fn fail_when(self, needle: &'static str, code: i32) -> Self {
        self.on(move |spec| {
            spec.display()
                .contains(needle)
                .then(|| CommandOutput::failure(code, format!("{} failed", needle)))
        })
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(needle)).count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> RiggerResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        let output = self
            .handlers
            .iter()
            .find_map(|h| h(spec))
            .unwrap_or_else(CommandOutput::success);
        Ok(output)
    }
}
