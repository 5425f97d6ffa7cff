//! Check command - validate the task graph

use crate::cli::Workspace;
use crate::error::RiggerResult;
use crate::tasks::TaskGraph;
use crate::ui::{self, UiContext};

/// Fails on the first unknown dependency or cycle
pub async fn execute(workspace: &Workspace) -> RiggerResult<()> {
    let ctx = UiContext::detect();
    let graph = TaskGraph::from_config(&workspace.config)?;
    graph.validate()?;

    ui::step_ok_detail(
        &ctx,
        "Task graph is valid",
        &format!(
            "{} tasks, {} tools",
            graph.len(),
            workspace.config.tools.len()
        ),
    );
    Ok(())
}
