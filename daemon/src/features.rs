//! Per-workload feature vector assembly

use crate::collector::{MetricsSource, QuerySample};
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Query whose truthy rows form the liveness set
pub const LIVENESS_QUERY: &str = r#"kube_pod_status_phase{phase="Running"}"#;
pub const LIVENESS_NAME: &str = "liveness";

pub const FEATURE_COUNT: usize = 8;

/// Workload identity within one cycle
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    pub namespace: String,
    pub name: String,
}

impl EntityId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// How a raw query value becomes a feature value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Raw numeric value copied as is
    Rate,
    /// Positive raw value maps to 1, anything else to 0
    Indicator,
    /// Source expresses the negative condition: positive raw maps to 0, else 1
    InvertedIndicator,
}

impl MergeRule {
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            MergeRule::Rate => raw,
            MergeRule::Indicator => flag(raw > 0.0),
            MergeRule::InvertedIndicator => flag(raw <= 0.0),
        }
    }
}

fn flag(set: bool) -> f64 {
    if set {
        1.0
    } else {
        0.0
    }
}

/// Fixed feature schema, in column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    RestartRate,
    CrashLoopBackOff,
    ImagePullBackOff,
    OomKilled,
    PodPending,
    PodFailed,
    PodRunning,
    ContainerReady,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::RestartRate,
        Feature::CrashLoopBackOff,
        Feature::ImagePullBackOff,
        Feature::OomKilled,
        Feature::PodPending,
        Feature::PodFailed,
        Feature::PodRunning,
        Feature::ContainerReady,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::RestartRate => "restart_rate",
            Feature::CrashLoopBackOff => "crash_loop_back_off_flag",
            Feature::ImagePullBackOff => "image_pull_back_off_flag",
            Feature::OomKilled => "oom_killed_flag",
            Feature::PodPending => "pod_phase_pending_flag",
            Feature::PodFailed => "pod_failed_flag",
            Feature::PodRunning => "pod_running_flag",
            Feature::ContainerReady => "container_ready_flag",
        }
    }

    pub fn query(self) -> &'static str {
        match self {
            Feature::RestartRate => "increase(kube_pod_container_status_restarts_total[5m])",
            Feature::CrashLoopBackOff => {
                r#"kube_pod_container_status_waiting_reason{reason="CrashLoopBackOff"}"#
            }
            Feature::ImagePullBackOff => {
                r#"kube_pod_container_status_waiting_reason{reason="ImagePullBackOff"}"#
            }
            Feature::OomKilled => {
                r#"kube_pod_container_status_terminated_reason{reason="OOMKilled"}"#
            }
            Feature::PodPending => r#"kube_pod_status_phase{phase="Pending"}"#,
            Feature::PodFailed => r#"kube_pod_status_phase{phase="Failed"}"#,
            Feature::PodRunning => LIVENESS_QUERY,
            // "not ready" query feeding the positively framed ready flag
            Feature::ContainerReady => r#"kube_pod_container_status_ready{ready="false"}"#,
        }
    }

    pub fn merge_rule(self) -> MergeRule {
        match self {
            Feature::RestartRate => MergeRule::Rate,
            Feature::ContainerReady => MergeRule::InvertedIndicator,
            _ => MergeRule::Indicator,
        }
    }
}

/// Complete fixed-schema record for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub namespace: String,
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.values[f.index()]))
    }
}

#[derive(Debug)]
struct PartialVector {
    namespace: String,
    values: [Option<f64>; FEATURE_COUNT],
}

impl PartialVector {
    fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            values: [None; FEATURE_COUNT],
        }
    }

    /// Unset features take their neutral default of 0
    fn complete(self) -> FeatureVector {
        FeatureVector {
            namespace: self.namespace,
            values: self.values.map(|v| v.unwrap_or(0.0)),
        }
    }
}

pub type FeatureMap = BTreeMap<EntityId, FeatureVector>;

/// Fans out the feature catalog and merges results into per-entity vectors
pub struct FeatureAggregator<S> {
    source: S,
    freshness: Duration,
}

impl<S: MetricsSource> FeatureAggregator<S> {
    pub fn new(source: S, freshness: Duration) -> Self {
        Self { source, freshness }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Build one complete vector per live entity seen in any feature query.
    ///
    /// `now` is the cycle start in unix seconds; samples older than the
    /// freshness threshold relative to it are discarded.
    pub async fn build_feature_vectors(&self, now: f64) -> FeatureMap {
        let liveness = self.source.query(LIVENESS_NAME, LIVENESS_QUERY);
        let features = join_all(
            Feature::ALL
                .iter()
                .map(|f| self.source.query(f.name(), f.query())),
        );
        let (liveness, results) = futures::join!(liveness, features);

        let live = liveness_set(&liveness);
        if live.is_empty() {
            info!("liveness set is empty");
            return FeatureMap::new();
        }

        let cutoff = now - self.freshness.as_secs_f64();
        let mut partial: BTreeMap<EntityId, PartialVector> = BTreeMap::new();
        for (feature, samples) in Feature::ALL.iter().zip(results) {
            let mut merged = 0usize;
            for sample in samples {
                let id = EntityId::new(&sample.namespace, &sample.name);
                if !live.contains(&id) || sample.timestamp < cutoff {
                    continue;
                }
                let entry = partial
                    .entry(id)
                    .or_insert_with(|| PartialVector::new(&sample.namespace));
                entry.values[feature.index()] = Some(feature.merge_rule().apply(sample.value));
                merged += 1;
            }
            debug!(feature = feature.name(), merged, "feature merged");
        }

        partial
            .into_iter()
            .map(|(id, vector)| (id, vector.complete()))
            .collect()
    }
}

/// Entities currently reported in the running phase
pub fn liveness_set(samples: &[QuerySample]) -> HashSet<EntityId> {
    samples
        .iter()
        .filter(|s| s.value > 0.0)
        .map(|s| EntityId::new(&s.namespace, &s.name))
        .collect()
}
