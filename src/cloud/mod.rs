//! Cloud ingest service boundary
//!
//! The collector only ever talks to the service through [`CloudApi`]. The
//! reqwest-backed [`Client`] is the production implementation and sits
//! behind the `http-client` feature.

#[cfg(feature = "http-client")]
pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

#[cfg(feature = "http-client")]
pub use client::{Client, ClientConfig};
pub use error::CloudError;
pub use types::{CloudSample, CreateTestRunResponse, ReferenceId, SampleData, SampleKind, TestRun};

use crate::core::threshold::ThresholdResult;

/// Remote operations the collector depends on.
///
/// Implementations own transport, authentication and retry policy; callers
/// impose no timeouts of their own.
#[async_trait]
pub trait CloudApi: Send + Sync + 'static {
    /// Registers a new test run and returns its reference.
    async fn create_test_run(&self, run: &TestRun) -> Result<CreateTestRunResponse, CloudError>;

    /// Uploads one batch of samples for a registered run.
    async fn push_metric(
        &self,
        reference_id: &ReferenceId,
        samples: &[CloudSample],
    ) -> Result<(), CloudError>;

    /// Reports threshold outcomes and closes the run.
    async fn test_finished(
        &self,
        reference_id: &ReferenceId,
        thresholds: &ThresholdResult,
        tainted: bool,
    ) -> Result<(), CloudError>;
}
