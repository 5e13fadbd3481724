//! Metrics backend collector

pub mod prometheus;

pub use prometheus::PrometheusClient;

/// Label carrying the workload name
pub const ENTITY_LABEL: &str = "pod";
pub const NAMESPACE_LABEL: &str = "namespace";
pub const DEFAULT_NAMESPACE: &str = "default";

/// One normalized result row of a query
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySample {
    pub name: String,
    pub namespace: String,
    pub value: f64,
    /// Unix seconds
    pub timestamp: f64,
}

/// Pull-based query interface over the metrics backend.
///
/// Implementations never fail the caller: any transport, status or payload
/// problem is logged and reported as an empty result.
#[async_trait::async_trait]
pub trait MetricsSource: Send + Sync {
    async fn query(&self, name: &str, expression: &str) -> Vec<QuerySample>;
}
