use homeassistant_desktop::app::{App, ConfigureArgs, configure};
use homeassistant_desktop::cli::{Cli, Command};
use homeassistant_desktop::error::DesktopError;
use homeassistant_desktop::logger::initialize as LoggerInitialize;

use client_core::SettingsStore;

use std::fs::create_dir_all;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::info;

const LOG_DIR_NAME: &str = "logs";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command_or_default() {
        Command::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Configure {
            host,
            port,
            secure,
            entities,
        } => run_configure(&cli, ConfigureArgs { host, port, secure, entities }),
        Command::Main => run_main(&cli).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_attempts_exhausted() {
                eprintln!("Gave up reconnecting to the hub: {e}");
            } else {
                eprintln!("{e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn open_store(dir: &Path) -> Result<SettingsStore, DesktopError> {
    create_dir_all(dir).map_err(|e| DesktopError::app(format!("Failed to create {}: {e}", dir.display())))?;
    Ok(SettingsStore::open(dir)?)
}

fn run_configure(cli: &Cli, args: ConfigureArgs) -> Result<(), DesktopError> {
    let dir = cli.settings_dir()?;
    let store = open_store(&dir)?;
    let saved = configure(&store, args)?;

    println!(
        "Saved {} ({}://{}:{}, {} entities)",
        dir.join(client_core::SETTINGS_FILE_NAME).display(),
        if saved.home_assistant_secure { "wss" } else { "ws" },
        saved.home_assistant_host,
        saved.home_assistant_port,
        saved.home_assistant_subscribed_entities.len()
    );
    Ok(())
}

async fn run_main(cli: &Cli) -> Result<(), DesktopError> {
    let dir = cli.settings_dir()?;
    let store = Arc::new(open_store(&dir)?);

    let level = cli.log_level(&store.snapshot())?;
    let log_dir = dir.join(LOG_DIR_NAME);
    create_dir_all(&log_dir)
        .map_err(|e| DesktopError::app(format!("Failed to create log directory: {e}")))?;
    LoggerInitialize(&log_dir, level)?;

    info!("Home Assistant desktop starting");
    info!("Settings directory: {}", dir.display());

    App::new(store).run().await
}
