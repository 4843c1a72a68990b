use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-metric pass/fail outcome: metric name → expression source → failed.
pub type ThresholdResult = BTreeMap<String, BTreeMap<String, bool>>;

/// A threshold expression and the engine's latest verdict on it.
#[derive(Debug)]
pub struct Threshold {
    source: String,
    failed: AtomicBool,
}

impl Threshold {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            failed: AtomicBool::new(false),
        }
    }

    /// The expression exactly as the user wrote it, e.g. `p(95)<200`.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn set_failed(&self, failed: bool) {
        self.failed.store(failed, Ordering::Release);
    }
}

/// Thresholds configured for a run, keyed by metric. Clones share verdicts.
#[derive(Debug, Clone, Default)]
pub struct ThresholdTracker {
    thresholds: BTreeMap<String, Vec<Arc<Threshold>>>,
}

impl ThresholdTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, metric: impl Into<String>, threshold: Threshold) -> Arc<Threshold> {
        let threshold = Arc::new(threshold);
        self.thresholds
            .entry(metric.into())
            .or_default()
            .push(Arc::clone(&threshold));
        threshold
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Iterates `(metric, thresholds)` pairs in metric-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Arc<Threshold>])> {
        self.thresholds
            .iter()
            .map(|(name, list)| (name.as_str(), list.as_slice()))
    }

    // Declaration order within a metric is kept.
    pub fn sources(&self) -> BTreeMap<String, Vec<String>> {
        self.iter()
            .map(|(name, list)| {
                let sources = list.iter().map(|t| t.source().to_string()).collect();
                (name.to_string(), sources)
            })
            .collect()
    }

    /// Captures the current verdicts along with whether any of them failed.
    pub fn snapshot(&self) -> (ThresholdResult, bool) {
        let mut tainted = false;
        let mut result = ThresholdResult::new();

        for (name, list) in self.iter() {
            let entry = result.entry(name.to_string()).or_default();
            for threshold in list {
                let failed = threshold.failed();
                tainted |= failed;
                entry.insert(threshold.source().to_string(), failed);
            }
        }

        (result, tainted)
    }
}
