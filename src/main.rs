//! Rigger CLI entry point

use clap::Parser;
use console::style;
use rigger::cli::args::LogFormat;
use rigger::cli::{commands, Cli, Commands, Workspace};
use rigger::error::{RiggerError, RiggerResult};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let outcome = tokio::select! {
        result = run() => result,
        // Dropping `run` kills the running child process
        _ = tokio::signal::ctrl_c() => Err(RiggerError::Interrupted),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> RiggerResult<()> {
    let cli = Cli::parse();

    // Completions never need a project
    if let Commands::Completions { shell } = cli.command {
        commands::completions(shell);
        return Ok(());
    }

    let workspace = Workspace::load(&cli).await?;

    let json = match cli.log_format {
        Some(format) => format == LogFormat::Json,
        None => workspace.config.general.log_format == LogFormat::Json.as_str(),
    };
    init_logging(cli.verbose, json);
    rigger::ui::init_theme();

    match cli.command {
        Commands::Completions { .. } => unreachable!("handled above"),
        Commands::Run(args) => commands::run(args, &workspace).await,
        Commands::List(args) => commands::list(args, &workspace).await,
        Commands::Check => commands::check(&workspace).await,
        Commands::Tools(args) => commands::tools(args, &workspace).await,
        Commands::Release(args) => commands::release(args, &workspace).await,
        Commands::Image(args) => commands::image(args, &workspace).await,
        Commands::Clean(args) => commands::clean(args, &workspace).await,
        Commands::Config(args) => commands::config(args, &workspace).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("rigger=warn"),
        1 => EnvFilter::new("rigger=info"),
        _ => EnvFilter::new("rigger=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
