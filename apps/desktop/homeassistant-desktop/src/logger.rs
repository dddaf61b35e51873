//! Logging for the desktop runner: colored stdout plus a plain log file.

use crate::error::DesktopError;

use std::fmt::Arguments;
use std::io::stdout;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use fern::{Dispatch, FormatCallback};
use humantime::format_rfc3339;
use log::{LevelFilter, Record, info, warn};

static INSTALL: Once = Once::new();
static INSTALL_ATTEMPTED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "homeassistant-desktop.log";

/// Install the global logger at `level`, writing to stdout and `log_dir/homeassistant-desktop.log`.
///
/// Only the first successful call installs anything; later calls log a warning
/// and return Ok. The log file is opened on every call, so an unusable
/// directory is always reported.
///
/// # Errors
///
/// Returns [`DesktopError::App`] if the log file cannot be opened or the
/// global logger cannot be installed.
pub fn initialize(log_dir: &Path, level: LevelFilter) -> Result<(), DesktopError> {
    let log_file = fern::log_file(log_dir.join(LOG_FILE_NAME))
        .map_err(|e| DesktopError::app(format!("Failed to create log file: {e}")))?;

    if INSTALL_ATTEMPTED.swap(true, Ordering::SeqCst) {
        warn!("Logger already initialized; keeping the existing configuration");
        return Ok(());
    }

    let mut result = Ok(());
    INSTALL.call_once(|| {
        let colors = ColoredLevelConfig::new()
            .trace(Magenta)
            .debug(Blue)
            .info(Green)
            .warn(Yellow)
            .error(Red);

        result = Dispatch::new()
            .level(level)
            .chain(
                Dispatch::new()
                    .format(move |out, message, record| write_line(out, message, record, Some(&colors)))
                    .chain(stdout()),
            )
            .chain(
                Dispatch::new()
                    .format(|out, message, record| write_line(out, message, record, None))
                    .chain(log_file),
            )
            .apply()
            .map_err(|e| DesktopError::app(format!("Failed to initialize logger: {e}")));
    });

    if result.is_ok() {
        info!("Logging at {level} to {}", log_dir.join(LOG_FILE_NAME).display());
    }
    result
}

/// `[<rfc3339> - <LEVEL>] <message> [<file>:<line>]`
fn write_line(out: FormatCallback, message: &Arguments, record: &Record, colors: Option<&ColoredLevelConfig>) {
    let date = format_rfc3339(SystemTime::now());
    let file = record.file().unwrap_or("unknown");
    let line = record.line().unwrap_or(0);
    match colors {
        Some(colors) => out.finish(format_args!(
            "[{date} - {}] {message} [{file}:{line}]",
            colors.color(record.level())
        )),
        None => out.finish(format_args!("[{date} - {}] {message} [{file}:{line}]", record.level())),
    }
}
