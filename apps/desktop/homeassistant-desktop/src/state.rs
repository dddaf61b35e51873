use crate::error::DesktopError;

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{RwLock, mpsc};

/// Commands that change what the tray shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayCommand {
    /// Show the given entity summary as the tooltip
    SetTooltip(String),

    /// Nothing to show (no subscriptions, or the hub went away)
    ClearTooltip,
}

impl TrayCommand {
    pub fn from_summary(summary: Option<String>) -> Self {
        match summary {
            Some(text) => Self::SetTooltip(text),
            None => Self::ClearTooltip,
        }
    }
}

/// Tray state manager.
///
/// All mutations go through a single actor task. Commands are queued
/// synchronously, so they apply in exactly the order the callers issued them,
/// whichever thread the callers run on. Reads go straight to the shared tooltip.
#[derive(Clone)]
pub struct TrayState {
    command_tx: Arc<Mutex<mpsc::UnboundedSender<TrayCommand>>>,
    /// Held until the actor is spawned on the first update.
    command_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<TrayCommand>>>>,
    tooltip: Arc<RwLock<Option<String>>>,
}

impl TrayState {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            command_tx: Arc::new(Mutex::new(tx)),
            command_rx: Arc::new(Mutex::new(Some(rx))),
            tooltip: Arc::new(RwLock::new(None)),
        }
    }

    /// Queue a tray update.
    ///
    /// # Errors
    ///
    /// Returns [`DesktopError::App`] outside a tokio runtime or if the actor has stopped.
    pub fn update(&self, cmd: TrayCommand) -> Result<(), DesktopError> {
        self.update_with(|| cmd)
    }

    /// Build a command and queue it as one step.
    ///
    /// Concurrent callers are serialized around `build`, so a command built from
    /// newer state is never queued ahead of one built from older state.
    pub fn update_with(&self, build: impl FnOnce() -> TrayCommand) -> Result<(), DesktopError> {
        self.ensure_actor()?;

        let tx = self.command_tx.lock();
        tx.send(build())
            .map_err(|e| DesktopError::app(format!("Tray actor died: {e}")))
    }

    pub async fn tooltip(&self) -> Option<String> {
        self.tooltip.read().await.clone()
    }

    fn ensure_actor(&self) -> Result<(), DesktopError> {
        let mut rx_guard = self.command_rx.lock();
        if rx_guard.is_none() {
            return Ok(());
        }

        let handle = Handle::try_current()
            .map_err(|e| DesktopError::app(format!("Tray actor needs a tokio runtime: {e}")))?;
        if let Some(rx) = rx_guard.take() {
            handle.spawn(tray_actor(rx, Arc::clone(&self.tooltip)));
            info!("Tray actor spawned");
        }
        Ok(())
    }
}

impl Default for TrayState {
    fn default() -> Self {
        Self::new()
    }
}

async fn tray_actor(
    mut command_rx: mpsc::UnboundedReceiver<TrayCommand>,
    tooltip: Arc<RwLock<Option<String>>>,
) {
    while let Some(cmd) = command_rx.recv().await {
        let mut tooltip_write = tooltip.write().await;
        match cmd {
            TrayCommand::SetTooltip(text) => {
                if tooltip_write.as_deref() != Some(text.as_str()) {
                    debug!("Tray tooltip: {}", text.replace('\n', " | "));
                    *tooltip_write = Some(text);
                }
            }
            TrayCommand::ClearTooltip => {
                if tooltip_write.take().is_some() {
                    debug!("Tray tooltip cleared");
                }
            }
        }
    }

    warn!("Tray actor stopped");
}
