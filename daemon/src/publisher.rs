//! Anomalous-workload signal file writer

use crate::detector::AnomalyResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Overwrites the shared signal file with the current anomalous set
#[derive(Debug, Clone)]
pub struct SignalPublisher {
    path: PathBuf,
}

impl SignalPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file content; failures are logged, never returned
    pub fn publish(&self, anomalies: &[AnomalyResult]) {
        match self.write(anomalies) {
            Ok(()) => debug!(path = %self.path.display(), count = anomalies.len(), "signal file written"),
            Err(e) => error!(path = %self.path.display(), error = %e, "failed to write signal file"),
        }
    }

    pub fn write(&self, anomalies: &[AnomalyResult]) -> std::io::Result<()> {
        fs::write(&self.path, render(anomalies))
    }
}

/// One `namespace/name` line per anomaly
pub fn render(anomalies: &[AnomalyResult]) -> String {
    anomalies
        .iter()
        .map(|a| format!("{}/{}\n", a.namespace, a.entity.name))
        .collect()
}
