//! Metrics backend query protocol (JSON envelope)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default, rename = "errorType")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryData {
    #[serde(rename = "resultType")]
    pub result_type: String,
    pub result: Vec<InstantSample>,
}

/// One instant-vector element: label set plus `[timestamp, "value"]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstantSample {
    pub metric: HashMap<String, String>,
    pub value: (f64, String),
}
