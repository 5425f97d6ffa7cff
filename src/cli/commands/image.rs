//! Image command - build, push or inspect the operator image

use crate::cli::args::{ImageAction, ImageArgs};
use crate::cli::Workspace;
use crate::error::RiggerResult;
use crate::ui::{self, TaskSpinner, UiContext};

pub async fn execute(args: ImageArgs, workspace: &Workspace) -> RiggerResult<()> {
    let ctx = UiContext::detect();
    let pipeline = workspace.pipeline()?;
    let images = pipeline.images();
    let image = &workspace.config.image.name;

    match args.action {
        ImageAction::Build => {
            images.build(image, &pipeline.cache(), false).await?;
            ui::step_ok_detail(&ctx, "Built", image);
        }
        ImageAction::Push => {
            images.build(image, &pipeline.cache(), true).await?;
            ui::step_ok_detail(&ctx, "Pushed", image);
        }
        ImageAction::Inspect { reference } => {
            let reference = reference.as_deref().unwrap_or(image);
            let mut spinner = TaskSpinner::new(&ctx);
            spinner.start(&format!("Looking up {}", reference));
            if images.inspect(reference).await? {
                spinner.stop(&format!("{} is published", reference));
            } else {
                spinner.stop_error(&format!("{} not found", reference));
            }
        }
    }
    Ok(())
}
