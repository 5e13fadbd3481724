//! Fixed-interval detection cycle and its fault boundary

use crate::collector::MetricsSource;
use crate::detector::{AnomalyResult, Detector};
use crate::features::FeatureAggregator;
use crate::publisher::SignalPublisher;
use anyhow::{anyhow, Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Outcome of one completed cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub entities: usize,
    pub anomalies: Vec<AnomalyResult>,
}

pub struct Supervisor<S> {
    aggregator: FeatureAggregator<S>,
    detector: Arc<dyn Detector>,
    publisher: SignalPublisher,
    contamination: f64,
    interval: Duration,
}

impl<S: MetricsSource> Supervisor<S> {
    pub fn new(
        aggregator: FeatureAggregator<S>,
        detector: Arc<dyn Detector>,
        publisher: SignalPublisher,
        contamination: f64,
        interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            detector,
            publisher,
            contamination,
            interval,
        }
    }

    pub fn aggregator(&self) -> &FeatureAggregator<S> {
        &self.aggregator
    }

    /// One query, aggregate, score, publish pass
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let vectors = self.aggregator.build_feature_vectors(unix_now()).await;

        if vectors.is_empty() {
            warn!("no live workloads with metrics this cycle");
            self.publisher.publish(&[]);
            return Ok(CycleReport::default());
        }
        info!(entities = vectors.len(), "feature vectors built");

        let entities = vectors.len();
        let detector = Arc::clone(&self.detector);
        let contamination = self.contamination;
        let anomalies = tokio::task::spawn_blocking(move || detector.score(&vectors, contamination))
            .await
            .map_err(|e| anyhow!("scoring task failed: {}", e))?
            .context("scoring failed")?;

        if anomalies.is_empty() {
            info!("no anomalies detected");
        } else {
            info!(count = anomalies.len(), "anomalies detected");
            for anomaly in &anomalies {
                log_anomaly(anomaly);
            }
        }

        self.publisher.publish(&anomalies);
        Ok(CycleReport {
            entities,
            anomalies,
        })
    }

    /// Run one cycle, containing any failure so the loop can retry
    pub async fn run_once(&self) -> Option<CycleReport> {
        match self.run_cycle().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = ?e, "detection cycle failed, retrying next interval");
                None
            }
        }
    }

    /// Loop forever at the configured interval until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
                _ = async {
                    interval.tick().await;
                    self.run_once().await;
                } => {}
            }
        }
    }
}

fn log_anomaly(anomaly: &AnomalyResult) {
    let breakdown = anomaly
        .features
        .iter()
        .map(|(feature, value)| format!("{}={}", feature.name(), value))
        .collect::<Vec<_>>()
        .join(" ");
    warn!(
        pod = %anomaly.entity.name,
        namespace = %anomaly.namespace,
        score = %format!("{:.3}", anomaly.score),
        features = %breakdown,
        "anomalous workload"
    );
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
