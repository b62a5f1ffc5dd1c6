use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_relay::adapters::http::{app_router, AppState};
use stream_relay::adapters::video::{HttpVideoProvider, MockVideoProvider, WebhookVerifier};
use stream_relay::adapters::{
    InMemoryCircuitBreaker, InMemoryConnectionRegistry, ProcessMemorySampler,
    ResilientVideoProvider, RoomBroadcaster,
};
use stream_relay::application::{CapacityMonitor, RelayService, ScheduledTask};
use stream_relay::config::AppConfig;
use stream_relay::ports::VideoProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.server.log_level.clone().into());
    let json = config.server.log_json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    config.validate().context("validating configuration")?;
    tracing::info!(environment = ?config.server.environment, "Configuration loaded");

    // Scaling state: the monitor writes, admission reads
    let (scaling_tx, scaling_rx) = watch::channel(config.scaling.initial_state(&config.relay));

    let registry = Arc::new(InMemoryConnectionRegistry::new(scaling_rx.clone()));
    let rooms = Arc::new(RoomBroadcaster::new(config.relay.room_shards));
    let relay = Arc::new(RelayService::new(
        registry,
        rooms,
        config.relay.service_config(),
    ));

    let provider: Arc<dyn VideoProvider> = match config.video.http_config() {
        Some(http) => Arc::new(HttpVideoProvider::new(http)?),
        None => {
            tracing::warn!("Video credentials not configured, using in-memory provider");
            Arc::new(MockVideoProvider::new())
        }
    };
    let breaker = Arc::new(InMemoryCircuitBreaker::new(
        "video-provider",
        config.resilience.breaker(),
    ));
    let video = Arc::new(ResilientVideoProvider::new(
        provider,
        breaker,
        config.resilience.retry(),
    ));

    let webhooks = config
        .video
        .webhook_secret
        .clone()
        .map(|secret| Arc::new(WebhookVerifier::new(secret)));
    if webhooks.is_none() {
        tracing::warn!("Webhook secret not configured, provider webhooks are disabled");
    }

    let monitor = Arc::new(CapacityMonitor::new(
        config.scaling.policy(&config.relay),
        scaling_tx,
        Arc::clone(&relay),
        Arc::new(ProcessMemorySampler::new(config.scaling.memory_budget_mb)),
    ));
    let monitor_task = ScheduledTask::spawn(monitor, config.scaling.tick());

    let state = AppState {
        relay,
        video,
        scaling: scaling_rx,
        webhooks,
    };
    let app = app_router(state, &config.server.cors_origins_list());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, "Stream relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor_task.cancel().await;
    tracing::info!("Stream relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
