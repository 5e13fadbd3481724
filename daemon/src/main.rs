use anyhow::{Context, Result};
use podsentry_daemon::{
    collector::PrometheusClient,
    config::Config,
    detector::{forest::ForestConfig, AnomalyDetector},
    features::FeatureAggregator,
    publisher::SignalPublisher,
    scheduler::Supervisor,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("podsentry daemon starting...");

    let config = Config::resolve().context("invalid configuration")?;
    info!(
        prometheus = %config.prometheus.url,
        interval_secs = config.detection.interval_secs,
        contamination = config.detection.contamination,
        freshness_secs = config.detection.freshness_secs,
        signal_path = %config.output.signal_path.display(),
        "configuration loaded"
    );
    if config.interval_exceeds_freshness() {
        warn!(
            interval_secs = config.detection.interval_secs,
            freshness_secs = config.detection.freshness_secs,
            "polling interval exceeds freshness threshold; samples may be dropped as stale"
        );
    }

    let client = PrometheusClient::new(&config.prometheus.url, config.query_timeout())
        .context("failed to build metrics client")?;
    let detector = AnomalyDetector::new(ForestConfig {
        n_estimators: config.detection.n_estimators,
        max_samples: config.detection.max_samples,
        seed: config.detection.seed,
    });
    let supervisor = Supervisor::new(
        FeatureAggregator::new(client, config.freshness()),
        Arc::new(detector),
        SignalPublisher::new(&config.output.signal_path),
        config.detection.contamination,
        config.interval(),
    );

    info!("daemon ready, entering detection loop");
    supervisor.run_until(shutdown_signal()).await;

    info!("podsentry daemon stopped");
    Ok(())
}
