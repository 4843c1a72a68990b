use std::sync::Arc;

use crate::cloud::{CloudApi, CloudError, CloudSample, ReferenceId, TestRun};
use crate::core::threshold::ThresholdResult;

/// Thin façade over the run-lifecycle calls of a [`CloudApi`].
///
/// Keeps the collector's orchestration free of request shapes: the
/// collector hands over a descriptor, batches and verdicts, and gets back
/// plain results to log.
#[derive(Clone)]
pub struct RunRegistrar {
    api: Arc<dyn CloudApi>,
}

impl RunRegistrar {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self { api }
    }

    /// Registers the run and returns the reference assigned to it.
    pub async fn register(&self, run: &TestRun) -> Result<ReferenceId, CloudError> {
        let response = self.api.create_test_run(run).await?;
        if response.reference_id.as_str().is_empty() {
            return Err(CloudError::InvalidResponse(
                "empty reference id in create test run response".to_string(),
            ));
        }
        Ok(response.reference_id)
    }

    pub async fn push(
        &self,
        reference_id: &ReferenceId,
        batch: &[CloudSample],
    ) -> Result<(), CloudError> {
        self.api.push_metric(reference_id, batch).await
    }

    pub async fn finish(
        &self,
        reference_id: &ReferenceId,
        thresholds: &ThresholdResult,
        tainted: bool,
    ) -> Result<(), CloudError> {
        self.api.test_finished(reference_id, thresholds, tainted).await
    }
}

impl std::fmt::Debug for RunRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRegistrar").finish_non_exhaustive()
    }
}
