use super::{MetricsSource, QuerySample, DEFAULT_NAMESPACE, ENTITY_LABEL, NAMESPACE_LABEL};
use crate::error::QueryError;
use crate::protocol::{InstantSample, QueryResponse, STATUS_SUCCESS};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the instant query endpoint
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base_url: String,
    client: Client,
}

impl PrometheusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn query_url(&self) -> String {
        format!("{}/api/v1/query", self.base_url)
    }

    /// Run one instant query, surfacing every failure
    pub async fn fetch(&self, expression: &str) -> Result<Vec<QuerySample>, QueryError> {
        let response = self
            .client
            .get(self.query_url())
            .query(&[("query", expression)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        parse_response(&body)
    }
}

#[async_trait::async_trait]
impl MetricsSource for PrometheusClient {
    async fn query(&self, name: &str, expression: &str) -> Vec<QuerySample> {
        match self.fetch(expression).await {
            Ok(samples) => {
                debug!(feature = name, query = expression, count = samples.len(), "query completed");
                samples
            }
            Err(e) => {
                warn!(feature = name, query = expression, error = %e, "query failed");
                Vec::new()
            }
        }
    }
}

/// Decode a query envelope into normalized samples
pub fn parse_response(body: &[u8]) -> Result<Vec<QuerySample>, QueryError> {
    let envelope: QueryResponse = serde_json::from_slice(body)?;
    if envelope.status != STATUS_SUCCESS {
        return Err(QueryError::Backend {
            status: envelope.status,
            error_type: envelope.error_type.unwrap_or_default(),
            message: envelope.error.unwrap_or_default(),
        });
    }

    let Some(data) = envelope.data else {
        return Ok(Vec::new());
    };

    Ok(data.result.into_iter().filter_map(normalize).collect())
}

fn normalize(sample: InstantSample) -> Option<QuerySample> {
    let InstantSample { mut metric, value } = sample;
    let name = metric.remove(ENTITY_LABEL)?;
    let namespace = metric
        .remove(NAMESPACE_LABEL)
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    let (timestamp, raw) = value;
    match raw.trim().parse::<f64>() {
        Ok(value) if !value.is_finite() => {
            warn!(pod = %name, namespace = %namespace, raw = %raw, "skipping sample with non-finite value");
            None
        }
        Ok(value) => Some(QuerySample {
            name,
            namespace,
            value,
            timestamp,
        }),
        Err(_) => {
            warn!(pod = %name, namespace = %namespace, raw = %raw, "skipping sample with unparseable value");
            None
        }
    }
}
