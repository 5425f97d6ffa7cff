//! Run command - execute tasks in dependency order

use crate::cli::args::RunArgs;
use crate::cli::Workspace;
use crate::error::RiggerResult;
use crate::pipeline::Pipeline;
use crate::tasks::{Step, Task, TaskExecutor, TaskGraph};
use crate::ui::{self, UiContext};
use async_trait::async_trait;
use std::time::Instant;

pub async fn execute(args: RunArgs, workspace: &Workspace) -> RiggerResult<()> {
    let ctx = UiContext::detect();
    let graph = TaskGraph::from_config(&workspace.config)?;
    let names: Vec<&str> = args.tasks.iter().map(String::as_str).collect();

    if args.dry_run {
        print_plan(&ctx, &graph, &names)?;
        return Ok(());
    }

    let jobs = workspace.config.general.jobs.max(1);
    let executor = Reporting {
        inner: workspace.pipeline()?,
        ctx: ctx.clone(),
    };

    let started = Instant::now();
    graph
        .invocation()
        .with_jobs(jobs)
        .run_all(&names, &executor)
        .await?;

    ui::outro_success(
        &ctx,
        &format!("{} ({:.1}s)", args.tasks.join(", "), started.elapsed().as_secs_f64()),
    );
    Ok(())
}

/// Print what would run, in order, without side effects
fn print_plan(ctx: &UiContext, graph: &TaskGraph, names: &[&str]) -> RiggerResult<()> {
    let plan = graph.plan(names)?;
    ui::intro(ctx, "Plan");
    for (i, task) in plan.iter().enumerate() {
        println!("{:>3}. {}", i + 1, task.name);
        for step in &task.steps {
            match step {
                Step::Ensure(tool) => println!("       ensure {}", tool),
                Step::Shell(command) => println!("       $ {}", command),
                Step::Builtin(action) => println!("       [{}]", action),
            }
        }
    }
    Ok(())
}

/// Wraps the pipeline with per-task progress lines
struct Reporting {
    inner: Pipeline,
    ctx: UiContext,
}

#[async_trait]
impl TaskExecutor for Reporting {
    async fn execute(&self, task: &Task) -> RiggerResult<()> {
        ui::task_started(&self.ctx, &task.name);
        let started = Instant::now();
        let result = self.inner.execute(task).await;
        match result {
            Ok(()) => ui::task_finished(&self.ctx, &task.name, started.elapsed()),
            Err(_) => ui::step_error(&self.ctx, &format!("{} failed", task.name)),
        }
        result
    }
}
