//! Command-line surface of the desktop runner.

use crate::error::DesktopError;

use client_core::SETTINGS_PATH_HINT;
use client_core::settings::AppSettings;
use client_core::settings::app_settings::parse_log_level;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "homeassistant-desktop")]
#[command(about = "Keeps a live mirror of a Home Assistant hub for the desktop tray")]
#[command(after_help = const_format::concatcp!("Settings are read from ", SETTINGS_PATH_HINT, " unless --config-dir is given."))]
pub struct Cli {
    /// Directory holding settings.json, .env and the log file
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Log level override (TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Connect to the hub and keep the mirror in sync (default)
    Main,

    /// Print the version and exit
    Version,

    /// Update the connection settings
    Configure {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// Use wss:// instead of ws://
        #[arg(long)]
        secure: Option<bool>,

        /// Entity to show in the tray; repeat for several. Replaces the saved list.
        #[arg(long = "entity")]
        entities: Vec<String>,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Main)
    }

    /// `--config-dir`, or the per-user default.
    pub fn settings_dir(&self) -> Result<PathBuf, DesktopError> {
        match &self.config_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(AppSettings::default_dir()?),
        }
    }

    /// The command-line override wins over the saved setting.
    pub fn log_level(&self, settings: &AppSettings) -> Result<LevelFilter, DesktopError> {
        let raw = self.log_level.as_deref().unwrap_or(&settings.log_level);
        parse_log_level(raw).ok_or_else(|| DesktopError::app(format!("Unknown log level: {raw}")))
    }
}
