mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod ui;

use crate::cli::{Cli, Commands};
use crate::config::models::GlobalOptions;
use crate::error::{CliError, Result};
use crate::ui::UiManager;
use clap::Parser;
use tokio::task;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let (ui_manager, ui_sender, shutdown_sender) = UiManager::new();
    let ui_handle = task::spawn(ui_manager.run());

    let Cli {
        command,
        verbose,
        quiet,
        log_file,
        config,
        base_dir,
    } = Cli::parse();
    logging::setup_logging(verbose, quiet, log_file, ui_sender.clone())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook
        .install()
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install error hooks: {}", e)))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    let global = GlobalOptions { config, base_dir };
    let command_result = async {
        info!("foldbatch CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
        debug!("Parsed command: {:?}, global options: {:?}", &command, &global);

        match command {
            Commands::Split(args) => {
                info!("Dispatching to 'split' command.");
                commands::split::run(args, &global).await
            }
            Commands::Run(args) => {
                info!("Dispatching to 'run' command.");
                commands::run::run(args, &global, ui_sender).await
            }
            Commands::Status(args) => {
                info!("Dispatching to 'status' command.");
                commands::status::run(args, &global).await
            }
        }
    }
    .await;

    match &command_result {
        Ok(_) => info!("Command completed successfully."),
        Err(e) => error!("Command failed: {}", e),
    }

    if shutdown_sender.send(true).is_err() {
        warn!("UI manager may have already exited before shutdown signal.");
    }

    ui_handle
        .await
        .map_err(|e| CliError::Other(anyhow::anyhow!("UI manager task failed: {}", e)))?;

    command_result
}
