//! Release command - drive the release gate for one version

use crate::cli::args::ReleaseArgs;
use crate::cli::Workspace;
use crate::error::{RiggerError, RiggerResult};
use crate::image::PushOutcome;
use crate::release::ReleaseOutcome;
use crate::ui::{self, UiContext};

pub async fn execute(args: ReleaseArgs, workspace: &Workspace) -> RiggerResult<()> {
    let ctx = UiContext::detect();
    let version = args
        .version
        .or_else(|| workspace.config.release.version.clone())
        .ok_or(RiggerError::MissingVersion)?;

    let pipeline = workspace.pipeline()?;
    ui::intro(&ctx, &format!("Release {}", version));

    match pipeline.release_gate().run(&version).await? {
        ReleaseOutcome::Skipped { tag } => {
            ui::outro_warn(&ctx, &format!("{} already exists; nothing to do", tag));
        }
        ReleaseOutcome::Released {
            tag,
            resumed_from,
            image,
        } => {
            if let Some(stage) = resumed_from {
                ui::remark(&ctx, &format!("Resumed after {}", stage));
            }
            match image {
                Some(PushOutcome::Pushed(reference)) => {
                    ui::step_ok_detail(&ctx, "Image published", &reference)
                }
                Some(PushOutcome::AlreadyExists(reference)) => {
                    ui::step_warn_hint(&ctx, &format!("{} already published", reference), "left untouched")
                }
                None => {}
            }
            ui::outro_success(&ctx, &format!("Released {}", tag));
        }
    }
    Ok(())
}
