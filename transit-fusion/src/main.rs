use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transit_fusion::config::EngineConfig;
use transit_fusion::feeds::{RealtimeClient, SnapshotClient};
use transit_fusion::persist::ScheduleArchive;
use transit_fusion::refresh::{Refresher, ScheduleHandle};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(
        subfeeds = config.subfeeds.len(),
        realtime_feeds = config.realtime_urls.len(),
        "loaded configuration"
    );

    let offsets = match config.offset_cache() {
        Ok(offsets) => Arc::new(offsets),
        Err(e) => {
            error!(error = %e, "invalid offset settings");
            return ExitCode::FAILURE;
        }
    };

    let client_config = config.feed_client_config();
    let snapshot_clients: Result<Vec<_>, _> = config
        .subfeeds
        .iter()
        .map(|s| SnapshotClient::new(s.id.clone(), &s.url, &client_config))
        .collect();
    let realtime_clients: Result<Vec<_>, _> = config
        .realtime_urls
        .iter()
        .map(|url| RealtimeClient::new(url, &client_config))
        .collect();
    let (snapshot_clients, realtime_clients) = match (snapshot_clients, realtime_clients) {
        (Ok(s), Ok(r)) => (s, r),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "failed to create HTTP client");
            return ExitCode::FAILURE;
        }
    };

    // Serve the last good schedule until the first refresh succeeds.
    let archive = ScheduleArchive::new(&config.persist_dir);
    let handle = match archive.load(&config.config_hash) {
        Some(store) => {
            info!(trips = store.trips().len(), age = %store.age(), "restored persisted schedule");
            ScheduleHandle::with_schedule(store)
        }
        None => ScheduleHandle::new(),
    };

    let refresher = Arc::new(
        Refresher::new(
            handle,
            snapshot_clients,
            realtime_clients,
            offsets,
            config.config_hash.clone(),
        )
        .with_archive(archive)
        .with_stale_threshold(config.stale_threshold()),
    );

    let static_refresher = refresher.clone();
    let static_interval = config.static_refresh_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(static_interval);
        loop {
            interval.tick().await;
            if let Err(e) = static_refresher.refresh_static().await {
                warn!(error = %e, "static refresh failed");
            }
        }
    });

    let realtime_refresher = refresher.clone();
    let realtime_interval = config.realtime_refresh_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(realtime_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = realtime_refresher.refresh_realtime().await {
                warn!(error = %e, "realtime refresh failed");
            }
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        return ExitCode::FAILURE;
    }
    info!("shutting down");
    ExitCode::SUCCESS
}
