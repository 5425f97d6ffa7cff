//! Dependency graph, planning and execution

use super::task::Task;
use super::TaskExecutor;
use crate::config::Config;
use crate::error::{RiggerError, RiggerResult};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, error, info};

/// Category for tasks that do not declare one
pub const DEFAULT_CATEGORY: &str = "General";

/// Entry in the task listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskListing {
    pub name: String,
    pub help: String,
    pub category: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Registry of named tasks
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: BTreeMap<String, Task>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from every task in the configuration
    pub fn from_config(config: &Config) -> RiggerResult<Self> {
        let mut graph = Self::new();
        for (name, task) in &config.tasks {
            graph.register(Task::from_config(name, task))?;
        }
        Ok(graph)
    }

    /// Register a task. Names are unique.
    pub fn register(&mut self, task: Task) -> RiggerResult<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(RiggerError::DuplicateTask(task.name));
        }
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Execution order for the union of the named tasks' closures.
    ///
    /// Every dependency appears before its dependents and every task appears
    /// once. Fails on the first unknown name or cycle.
    pub fn plan(&self, names: &[&str]) -> RiggerResult<Vec<&Task>> {
        let mut marks = HashMap::new();
        let mut path = Vec::new();
        let mut order = Vec::new();

        for name in names {
            self.visit(name, None, &mut marks, &mut path, &mut order)?;
        }

        Ok(order)
    }

    /// Check every registered task for unknown dependencies and cycles
    pub fn validate(&self) -> RiggerResult<()> {
        let names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        self.plan(&names).map(|_| ())
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        required_by: Option<&str>,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        order: &mut Vec<&'a Task>,
    ) -> RiggerResult<()> {
        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| RiggerError::UnknownTask {
                name: name.to_string(),
                required_by: required_by.map(str::to_string),
            })?;

        match marks.get(task.name.as_str()) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Err(RiggerError::Cycle { path: cycle });
            }
            None => {}
        }

        marks.insert(&task.name, Mark::Visiting);
        path.push(&task.name);

        for dep in &task.deps {
            self.visit(dep, Some(&task.name), marks, path, order)?;
        }

        path.pop();
        marks.insert(&task.name, Mark::Done);
        order.push(task);
        Ok(())
    }

    /// Documented tasks, grouped by category then sorted by name.
    /// Tasks without help text stay invocable but are not listed.
    pub fn list_tasks(&self) -> Vec<TaskListing> {
        let mut listing: Vec<TaskListing> = self
            .tasks
            .values()
            .filter_map(|task| {
                task.help.as_ref().map(|help| TaskListing {
                    name: task.name.clone(),
                    help: help.clone(),
                    category: task
                        .category
                        .clone()
                        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                })
            })
            .collect();

        listing.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        listing
    }

    /// Start an invocation; completed tasks are remembered across its runs
    pub fn invocation(&self) -> Invocation<'_> {
        Invocation {
            graph: self,
            completed: HashSet::new(),
            jobs: 1,
        }
    }
}

/// One invocation of the orchestrator: the memoization scope
pub struct Invocation<'g> {
    graph: &'g TaskGraph,
    completed: HashSet<String>,
    jobs: usize,
}

impl<'g> Invocation<'g> {
    /// Allow up to `jobs` independent tasks to run concurrently
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn is_completed(&self, name: &str) -> bool {
        self.completed.contains(name)
    }

    /// Run one task and its dependency closure
    pub async fn run(&mut self, name: &str, executor: &dyn TaskExecutor) -> RiggerResult<()> {
        self.run_all(&[name], executor).await
    }

    /// Run several tasks; shared dependencies execute once.
    ///
    /// The whole plan is computed before any action runs, so unknown tasks
    /// and cycles never leave partial side effects.
    pub async fn run_all(&mut self, names: &[&str], executor: &dyn TaskExecutor) -> RiggerResult<()> {
        let graph = self.graph;
        let pending: Vec<&'g Task> = graph
            .plan(names)?
            .into_iter()
            .filter(|task| !self.completed.contains(&task.name))
            .collect();

        debug!(
            "Plan: {}",
            pending.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        if self.jobs <= 1 {
            for task in pending {
                info!("Running task {}", task.name);
                executor.execute(task).await?;
                self.completed.insert(task.name.clone());
            }
            Ok(())
        } else {
            self.run_pooled(pending, executor).await
        }
    }

    /// Bounded pool: a task starts only once all its dependencies completed.
    /// After the first failure no new task starts; in-flight tasks finish.
    async fn run_pooled(&mut self, mut waiting: Vec<&'g Task>, executor: &dyn TaskExecutor) -> RiggerResult<()> {
        let mut in_flight = FuturesUnordered::new();
        let mut first_error: Option<RiggerError> = None;

        loop {
            if first_error.is_none() {
                let mut i = 0;
                while i < waiting.len() && in_flight.len() < self.jobs {
                    let task = waiting[i];
                    if task.deps.iter().all(|d| self.completed.contains(d)) {
                        waiting.remove(i);
                        info!("Running task {}", task.name);
                        in_flight.push(async move { (task, executor.execute(task).await) });
                    } else {
                        i += 1;
                    }
                }
            }

            match in_flight.next().await {
                Some((task, Ok(()))) => {
                    self.completed.insert(task.name.clone());
                }
                Some((task, Err(e))) => {
                    error!("Task {} failed: {}", task.name, e);
                    first_error.get_or_insert(e);
                }
                None => break,
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if let Some(task) = waiting.first() {
            return Err(RiggerError::Internal(format!(
                "task {} could not be scheduled",
                task.name
            )));
        }
        Ok(())
    }
}
