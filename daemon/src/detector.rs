//! Anomaly scoring engine

pub mod forest;

use crate::error::ScoreError;
use crate::features::{EntityId, Feature, FeatureMap, FeatureVector};
use forest::{ForestConfig, IsolationForest};
use tracing::debug;

pub const DEFAULT_CONTAMINATION: f64 = 0.1;

/// One flagged workload
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyResult {
    pub entity: EntityId,
    pub namespace: String,
    /// Decision score, higher is more normal
    pub score: f64,
    pub features: FeatureVector,
}

pub trait Detector: Send + Sync {
    /// Fit on the whole batch and return the outlier-labeled entities
    fn score(
        &self,
        vectors: &FeatureMap,
        contamination: f64,
    ) -> Result<Vec<AnomalyResult>, ScoreError>;
}

/// Refits a fresh isolation forest on every batch
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: ForestConfig,
}

impl AnomalyDetector {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    /// Decision scores for every entity, in map order
    pub fn decision_scores(
        &self,
        vectors: &FeatureMap,
        contamination: f64,
    ) -> Result<Vec<(EntityId, f64, bool)>, ScoreError> {
        if !(contamination > 0.0 && contamination < 1.0) {
            return Err(ScoreError::InvalidContamination(contamination));
        }
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sample_matrix(vectors)?;
        let mut forest = IsolationForest::new(self.config);
        forest.fit(&rows, contamination);

        Ok(vectors
            .keys()
            .zip(&rows)
            .map(|(id, row)| {
                let verdict = forest.predict(row);
                (id.clone(), verdict.decision, verdict.outlier)
            })
            .collect())
    }
}

impl Detector for AnomalyDetector {
    fn score(
        &self,
        vectors: &FeatureMap,
        contamination: f64,
    ) -> Result<Vec<AnomalyResult>, ScoreError> {
        let scored = self.decision_scores(vectors, contamination)?;
        debug!(samples = scored.len(), "model fitted");

        Ok(scored
            .into_iter()
            .filter(|(_, _, outlier)| *outlier)
            .filter_map(|(entity, score, _)| {
                let features = vectors.get(&entity)?.clone();
                Some(AnomalyResult {
                    namespace: features.namespace.clone(),
                    entity,
                    score,
                    features,
                })
            })
            .collect())
    }
}

/// Rows in entity order, columns in schema order; namespace is left out
fn sample_matrix(vectors: &FeatureMap) -> Result<Vec<Vec<f64>>, ScoreError> {
    vectors
        .iter()
        .map(|(id, vector)| {
            for (feature, value) in vector.iter() {
                if !value.is_finite() {
                    return Err(non_finite(id, feature, value));
                }
            }
            Ok(vector.values.to_vec())
        })
        .collect()
}

fn non_finite(id: &EntityId, feature: Feature, value: f64) -> ScoreError {
    ScoreError::NonFinite {
        entity: id.to_string(),
        feature: feature.name(),
        value,
    }
}
