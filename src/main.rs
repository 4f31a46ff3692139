//! geoserve - geolocation lookups over HTTP
//!
//! This is the composition root that wires together all the components.

use anyhow::Context;
use geoserve::infrastructure::shutdown_signal;
use geoserve::{
    load_config, AccessLogger, ApiServer, ApiState, CapabilityRegistry, GeoBackend,
    LookupService, MaxMindBackend, ShutdownController,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting geoserve listen={} databases={} routing={}",
        cfg.listen_addr(),
        cfg.db_paths.len(),
        cfg.routing_mode
    );

    // ===== COMPOSITION ROOT =====

    // 1. Open every database; any failure is fatal
    let mut backends: Vec<Arc<dyn GeoBackend>> = Vec::with_capacity(cfg.db_paths.len());
    for path in &cfg.db_paths {
        let backend = MaxMindBackend::open(path)
            .with_context(|| format!("failed to open database {}", path))?;
        let kinds: Vec<&str> = backend.kinds().iter().map(|k| k.as_str()).collect();
        tracing::info!(
            "database loaded from {} ({}, kinds=[{}])",
            path,
            backend.database_type(),
            kinds.join(", ")
        );
        backends.push(Arc::new(backend));
    }

    // 2. Build the routing table
    let registry = CapabilityRegistry::for_mode(cfg.routing_mode, &backends)?;
    let served: Vec<&str> = registry.kinds().iter().map(|k| k.as_str()).collect();
    tracing::info!(
        "routing mode={} serving kinds=[{}]",
        registry.mode(),
        served.join(", ")
    );

    // 3. Access log
    let access_log = match &cfg.log_file {
        Some(path) => {
            let logger = AccessLogger::open_file(path, cfg.log_backlog)
                .with_context(|| format!("unable to open log file {}", path))?;
            tracing::info!("access log to {} (backlog {})", path, cfg.log_backlog);
            logger
        }
        None => AccessLogger::stdout(),
    };

    // 4. Application service and inbound adapter
    let shutdown = ShutdownController::new();
    let state = ApiState::new(
        LookupService::new(Arc::new(registry)),
        access_log.clone(),
        shutdown.clone(),
    );
    let server = ApiServer::new(cfg.listen_addr(), state);

    tokio::spawn(shutdown_signal(shutdown.clone()));

    let drained = server
        .run(Duration::from_secs(cfg.shutdown_timeout_secs))
        .await?;
    if !drained {
        tracing::warn!("stopped before every request finished");
    }

    // 5. Best-effort flush of queued access-log lines
    let flushed = tokio::task::spawn_blocking(move || access_log.close()).await?;
    if !flushed {
        tracing::warn!("access log was not flushed cleanly");
    }

    tracing::info!("geoserve stopped");
    Ok(())
}
