//! Config command - show resolved configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::cli::Workspace;
use crate::error::RiggerResult;

pub async fn execute(args: ConfigArgs, workspace: &Workspace) -> RiggerResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => {
            // Flags and environment overrides are already applied
            let toml = toml::to_string_pretty(&workspace.config)?;
            println!("{}", toml);
        }
        Some(ConfigAction::Path) => println!("{}", workspace.config_path.display()),
    }
    Ok(())
}
