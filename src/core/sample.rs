use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of metric a sample belongs to.
///
/// The remote service aggregates each kind differently, so the type travels
/// with every sample rather than being registered up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Monotonically increasing total.
    Counter,
    /// Last-value-wins measurement.
    Gauge,
    /// Distribution of values (durations, sizes).
    Trend,
    /// Ratio of non-zero to total values.
    Rate,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Trend => "trend",
            MetricType::Rate => "rate",
        };
        f.write_str(name)
    }
}

/// A single metric observation produced by the workload engine.
///
/// Samples are immutable once built; the builder-style `with_*` methods
/// consume and return the value so a sample can be assembled in one
/// expression at the measurement site.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    metric: String,
    metric_type: MetricType,
    time: DateTime<Utc>,
    value: f64,
    tags: BTreeMap<String, String>,
}

impl Sample {
    /// Creates a sample stamped with the current time and no tags.
    pub fn new(metric: impl Into<String>, metric_type: MetricType, value: f64) -> Self {
        Self {
            metric: metric.into(),
            metric_type,
            time: Utc::now(),
            value,
            tags: BTreeMap::new(),
        }
    }

    /// Overrides the observation time.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    /// Adds (or replaces) a single tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Replaces the full tag set.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}
