//! Wiring between the hub session, the settings store and the tray.

use crate::error::DesktopError;
use crate::state::{TrayCommand, TrayState};

use client_core::settings::{AppSettings, SettingsProvider, SettingsStore, subscribed_entities};
use client_core::{HubClient, RetryPolicy, Supervisor, WebSocketTransport};

use std::sync::Arc;

use futures_util::future::BoxFuture;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

pub type DesktopClient = HubClient<WebSocketTransport>;

/// One run of the desktop runner: a hub client under a supervisor, feeding the tray.
pub struct App {
    store: Arc<SettingsStore>,
    client: Arc<DesktopClient>,
    tray: TrayState,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl App {
    pub fn new(store: Arc<SettingsStore>) -> Self {
        let provider: Arc<dyn SettingsProvider> = store.clone();
        let client = Arc::new(HubClient::new(WebSocketTransport::new(), provider));

        let app = Self {
            store,
            client,
            tray: TrayState::new(),
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        };
        app.install_callbacks();
        app
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(&self) -> &Arc<DesktopClient> {
        &self.client
    }

    pub fn tray(&self) -> &TrayState {
        &self.tray
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn install_callbacks(&self) {
        let sync = Arc::downgrade(self.client.sync());
        let store = Arc::clone(&self.store);
        let tray = self.tray.clone();
        self.client
            .sync()
            .set_ready_callback(move || -> BoxFuture<'static, ()> {
                let sync = sync.clone();
                let store = Arc::clone(&store);
                let tray = tray.clone();
                Box::pin(async move {
                    let Some(sync) = sync.upgrade() else {
                        return;
                    };

                    let entities = subscribed_entities(&*store);
                    if !entities.is_empty() {
                        info!("Subscribing to {} entities", entities.len());
                        if let Err(e) = sync.subscribe_entities(entities).await {
                            warn!("Entity subscription failed: {e}");
                        }
                    }

                    if let Err(e) = tray.update_with(|| TrayCommand::from_summary(sync.entity_summary())) {
                        warn!("{e}");
                    }
                })
            });

        let sync = Arc::downgrade(self.client.sync());
        let tray = self.tray.clone();
        self.client.sync().watch_subscribed_entities(move || {
            let Some(sync) = sync.upgrade() else {
                return;
            };
            if let Err(e) = tray.update_with(|| TrayCommand::from_summary(sync.entity_summary())) {
                warn!("{e}");
            }
        });
    }

    /// Supervise the hub session until Ctrl-C, cancellation, or a fatal error.
    ///
    /// # Errors
    ///
    /// Returns [`DesktopError::Core`] when the supervisor gives up or the hub
    /// rejects the configuration or token.
    pub async fn run(&self) -> Result<(), DesktopError> {
        let shutdown = tokio::spawn(shutdown_on_ctrl_c(self.cancel.clone(), Arc::clone(&self.client)));

        let supervisor =
            Supervisor::new(Arc::clone(&self.client), self.cancel.clone()).with_policy(self.policy.clone());
        let result = supervisor.run().await;

        self.cancel.cancel();
        shutdown.abort();
        if let Err(e) = self.tray.update(TrayCommand::ClearTooltip) {
            warn!("{e}");
        }

        match result {
            Ok(()) => {
                info!("Stopped");
                Ok(())
            }
            Err(e) => {
                error!("Hub session ended: {e}");
                Err(e.into())
            }
        }
    }
}

async fn shutdown_on_ctrl_c(cancel: CancellationToken, client: Arc<DesktopClient>) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for Ctrl-C: {e}");
                return;
            }
        }
    }

    info!("Ctrl-C received, shutting down");
    cancel.cancel();
    client.close().await;
}

/// Connection settings accepted by the `configure` command. `None` leaves a value as is.
#[derive(Debug, Default, Clone)]
pub struct ConfigureArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secure: Option<bool>,
    pub entities: Vec<String>,
}

/// Apply `args` to the saved settings.
///
/// # Errors
///
/// Returns [`DesktopError::Settings`] if the result fails validation or cannot be written.
pub fn configure(store: &SettingsStore, args: ConfigureArgs) -> Result<AppSettings, DesktopError> {
    let updated = store.update(|settings| {
        if let Some(host) = args.host {
            settings.home_assistant_host = host;
        }
        if let Some(port) = args.port {
            settings.home_assistant_port = port;
        }
        if let Some(secure) = args.secure {
            settings.home_assistant_secure = secure;
        }
        if !args.entities.is_empty() {
            settings.home_assistant_subscribed_entities = args.entities;
        }
    })?;

    info!(
        "Saved settings: {}:{} (secure: {}), {} entities",
        updated.home_assistant_host,
        updated.home_assistant_port,
        updated.home_assistant_secure,
        updated.home_assistant_subscribed_entities.len()
    );
    Ok(updated)
}
