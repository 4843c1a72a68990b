//! Request and response shapes exchanged with the cloud ingest service.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::sample::{MetricType, Sample};
use crate::core::threshold::ThresholdResult;

/// Opaque identifier the service assigns to a registered test run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(String);

impl ReferenceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registration payload describing the run about to start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRun {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub project_id: i64,
    pub thresholds: BTreeMap<String, Vec<String>>,
    /// Planned length in seconds, `-1` when it cannot be known up front.
    pub duration: i64,
}

fn is_zero(id: &i64) -> bool {
    *id == 0
}

#[derive(Debug, Deserialize)]
pub struct CreateTestRunResponse {
    pub reference_id: ReferenceId,
}

/// Envelope type of a wire sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleKind {
    Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleData {
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub time: DateTime<Utc>,
    pub value: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// One sample in the shape the ingest endpoint accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudSample {
    #[serde(rename = "type")]
    pub kind: SampleKind,
    pub metric: String,
    pub data: SampleData,
}

impl From<&Sample> for CloudSample {
    fn from(sample: &Sample) -> Self {
        CloudSample {
            kind: SampleKind::Point,
            metric: sample.metric().to_string(),
            data: SampleData {
                metric_type: sample.metric_type(),
                time: sample.time(),
                value: sample.value(),
                tags: sample.tags().clone(),
            },
        }
    }
}

/// End-of-run report body.
#[derive(Debug, Serialize)]
pub struct TestFinishedRequest<'a> {
    /// `1` when any threshold failed, `0` otherwise.
    pub result_status: u8,
    pub thresholds: &'a ThresholdResult,
}

impl<'a> TestFinishedRequest<'a> {
    pub fn new(thresholds: &'a ThresholdResult, tainted: bool) -> Self {
        Self {
            result_status: u8::from(tainted),
            thresholds,
        }
    }
}

/// Error body returned by the service on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}
