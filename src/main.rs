use std::{env, sync::Arc};

use anyhow::{Context, Result, anyhow};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use idlelink::{
    catalog::StaticCatalog,
    cli::config_path_from_args,
    config::ClientConfig,
    guard::GuardTable,
    logging::init_tracing,
    notify::{ChannelNotificationSink, Notification},
    session::{GameClient, SESSION_CREDENTIAL_ENV, SessionOptions},
    transport::{Transport, adapters::WebSocketConnector, pump_link_events},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args()?;
    let config = ClientConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let logging_guard = init_tracing(&config.logging)?;

    let session_credential = env::var(SESSION_CREDENTIAL_ENV)
        .map_err(|_| anyhow!("{SESSION_CREDENTIAL_ENV} must be set"))?;
    let catalog = Arc::new(
        StaticCatalog::load(&config.catalog.path).context("failed to load game catalog")?,
    );

    let (transport, link_events) = Transport::new(Arc::new(WebSocketConnector::new()));
    let (notifier, mut notifications) = ChannelNotificationSink::new();
    let client = GameClient::new(
        Arc::clone(&transport),
        catalog,
        GuardTable::new(config.guards.default_timeout()),
        Arc::new(notifier),
        SessionOptions {
            session_credential,
            client_version: config.server.client_version.clone(),
            config_version: config.server.config_version,
            placeholders: config.inventory.placeholders,
        },
    );

    let shutdown = CancellationToken::new();
    let pump = tokio::spawn(pump_link_events(
        Arc::clone(&transport),
        link_events,
        shutdown.clone(),
    ));
    let observer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            match &notification {
                Notification::Failure { message } => {
                    tracing::error!(target: "client", message = %message, "client_failure")
                }
                other => tracing::info!(target: "client", notification = ?other, "notification"),
            }
        }
    });

    client
        .connect(&config.server.url)
        .with_context(|| format!("failed to connect to {}", config.server.url))?;
    tracing::info!(
        target: "client",
        run_id = %logging_guard.run_id(),
        url = %config.server.url,
        "client_started"
    );

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;
    let signal_name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };

    tracing::info!(target: "client", signal = signal_name, "client_stopping");
    client.close().context("failed to close connection")?;
    client.shutdown();
    shutdown.cancel();
    let handled = pump.await.context("link event pump join failed")?;
    drop(client);
    observer.abort();

    tracing::info!(target: "client", handled_events = handled, "client_stopped");
    Ok(())
}
