//! Task graph
//!
//! Tasks are registered with their dependencies, planned with a depth-first
//! traversal (unknown names and cycles are rejected before anything runs),
//! and executed in dependency order, each at most once per invocation.

mod graph;
mod task;

pub use graph::{Invocation, TaskGraph, TaskListing, DEFAULT_CATEGORY};
pub use task::{BuiltinAction, Step, Task};

use crate::error::RiggerResult;
use async_trait::async_trait;

/// Executes a single task's action
///
/// The graph decides *when* a task runs; the executor decides *what* running
/// it means.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task) -> RiggerResult<()>;
}
