//! In-memory metrics backend for tests

#![allow(dead_code)]

use podsentry_daemon::collector::{MetricsSource, QuerySample};
use podsentry_daemon::features::{Feature, LIVENESS_NAME};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub const NOW: f64 = 1_700_000_000.0;

pub fn sample(namespace: &str, name: &str, value: f64, timestamp: f64) -> QuerySample {
    QuerySample {
        name: name.to_string(),
        namespace: namespace.to_string(),
        value,
        timestamp,
    }
}

/// Sample stamped with the wall clock, for cycles that read the real time
pub fn current(namespace: &str, name: &str, value: f64) -> QuerySample {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs_f64();
    sample(namespace, name, value, now)
}

pub fn fresh(namespace: &str, name: &str, value: f64) -> QuerySample {
    sample(namespace, name, value, NOW - 10.0)
}

/// Canned results keyed by query name; unknown queries return nothing
#[derive(Default)]
pub struct FakeSource {
    results: Mutex<HashMap<String, Vec<QuerySample>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, samples: Vec<QuerySample>) {
        self.results.lock().unwrap().insert(name.to_string(), samples);
    }

    pub fn set_feature(&self, feature: Feature, samples: Vec<QuerySample>) {
        self.set(feature.name(), samples);
    }

    /// Liveness and the pod_running_flag feature share one backend query
    pub fn set_running(&self, samples: Vec<QuerySample>) {
        self.set(LIVENESS_NAME, samples.clone());
        self.set(Feature::PodRunning.name(), samples);
    }

    /// Simulate a transport failure: the real client logs and returns empty
    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn clear(&self) {
        self.results.lock().unwrap().clear();
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MetricsSource for FakeSource {
    async fn query(&self, name: &str, _expression: &str) -> Vec<QuerySample> {
        self.calls.lock().unwrap().push(name.to_string());
        if self.failing.lock().unwrap().contains(name) {
            return Vec::new();
        }
        self.results
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}
