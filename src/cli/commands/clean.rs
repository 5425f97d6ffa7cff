//! Clean command - remove provisioned tools and coverage artifacts

use crate::cli::args::CleanArgs;
use crate::cli::Workspace;
use crate::error::{RiggerError, RiggerResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;
use tokio::fs;

pub async fn execute(args: CleanArgs, workspace: &Workspace) -> RiggerResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let pipeline = workspace.pipeline()?;
    let tools = pipeline.tools();

    let artifacts: Vec<PathBuf> = pipeline
        .coverage()
        .artifact_paths()
        .into_iter()
        .filter(|p| p.is_file())
        .collect();

    if !tools.tools_dir().exists() && artifacts.is_empty() {
        ui::step_info(&ctx, "Nothing to clean");
        return Ok(());
    }

    let prompt = format!("Remove {} and coverage artifacts?", tools.tools_dir().display());
    if !ui::confirm(&ctx, &prompt, false).await? {
        ui::step_warn_hint(&ctx, "Clean cancelled", "Use --yes to skip the prompt");
        return Ok(());
    }

    if tools.clean().await? {
        ui::step_ok_detail(&ctx, "Removed tools", &tools.tools_dir().display().to_string());
    }
    for artifact in &artifacts {
        fs::remove_file(artifact)
            .await
            .map_err(|e| RiggerError::io(format!("removing {}", artifact.display()), e))?;
        ui::step_ok_detail(&ctx, "Removed", &artifact.display().to_string());
    }
    Ok(())
}
