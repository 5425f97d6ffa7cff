//! Tools command - show or provision pinned tools

use crate::cli::args::{OutputFormat, ToolsAction, ToolsArgs};
use crate::cli::Workspace;
use crate::error::RiggerResult;
use crate::tools::{Provisioned, ToolProvisioner, ToolSpec};
use crate::ui::{self, TaskSpinner, UiContext};
use serde::Serialize;

#[derive(Serialize)]
struct ToolStatus<'a> {
    name: &'a str,
    source: String,
    path: String,
    installed: bool,
}

impl<'a> From<&'a ToolSpec> for ToolStatus<'a> {
    fn from(spec: &'a ToolSpec) -> Self {
        Self {
            name: &spec.name,
            source: spec.source.reference(),
            path: spec.install_path.display().to_string(),
            installed: spec.install_path.is_file(),
        }
    }
}

pub async fn execute(args: ToolsArgs, workspace: &Workspace) -> RiggerResult<()> {
    let pipeline = workspace.pipeline()?;
    let tools = pipeline.tools();

    match args.action {
        None => list(tools, OutputFormat::Table),
        Some(ToolsAction::List { format }) => list(tools, format),
        Some(ToolsAction::Ensure { names }) => ensure(tools, &names).await,
    }
}

fn list(tools: &ToolProvisioner, format: OutputFormat) -> RiggerResult<()> {
    let statuses: Vec<ToolStatus> = tools.specs().map(ToolStatus::from).collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&statuses)?),
        OutputFormat::Plain => {
            for status in &statuses {
                println!("{}", status.name);
            }
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            if statuses.is_empty() {
                ui::step_info(&ctx, "No tools declared");
                return Ok(());
            }
            ui::intro(&ctx, "Tools");
            for status in &statuses {
                let state = if status.installed { "installed" } else { "missing" };
                ui::key_value_status(
                    &ctx,
                    status.name,
                    &format!("{} ({})", state, status.source),
                    status.installed,
                );
            }
        }
    }
    Ok(())
}

async fn ensure(tools: &ToolProvisioner, names: &[String]) -> RiggerResult<()> {
    let ctx = UiContext::detect();
    let names: Vec<String> = if names.is_empty() {
        tools.specs().map(|s| s.name.clone()).collect()
    } else {
        names.to_vec()
    };

    for name in &names {
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start(&format!("Provisioning {}", name));
        match tools.ensure_named(name).await {
            Ok(Provisioned::AlreadyPresent(_)) => spinner.stop(&format!("{} already present", name)),
            Ok(Provisioned::Installed(path)) => {
                spinner.stop(&format!("{} installed to {}", name, path.display()))
            }
            Err(e) => {
                spinner.stop_error(&format!("{} failed", name));
                return Err(e);
            }
        }
    }
    Ok(())
}
