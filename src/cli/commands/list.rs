//! List command - show documented tasks by category

use crate::cli::args::{ListArgs, OutputFormat};
use crate::cli::Workspace;
use crate::error::RiggerResult;
use crate::tasks::{TaskGraph, TaskListing};
use crate::ui::{self, UiContext};
use console::style;

pub async fn execute(args: ListArgs, workspace: &Workspace) -> RiggerResult<()> {
    let graph = TaskGraph::from_config(&workspace.config)?;
    let tasks = graph.list_tasks();

    if tasks.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(&ctx, "No documented tasks");
                ui::remark(&ctx, "Add help = \"...\" to a task to list it");
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&tasks),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
        OutputFormat::Plain => {
            for task in &tasks {
                println!("{}", task.name);
            }
        }
    }

    Ok(())
}

fn print_table(tasks: &[TaskListing]) {
    let width = tasks.iter().map(|t| t.name.len()).max().unwrap_or(0).max(4) + 2;
    let mut category: Option<&str> = None;

    for task in tasks {
        if category != Some(task.category.as_str()) {
            if category.is_some() {
                println!();
            }
            println!("{}", style(&task.category).bold());
            category = Some(task.category.as_str());
        }
        println!("  {:<width$} {}", style(&task.name).cyan(), task.help, width = width);
    }
}
