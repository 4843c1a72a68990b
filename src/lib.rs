//! # Skyrelay
//!
//! Forwards the samples a load test produces to a remote aggregation service,
//! registers the run when it starts, and reports threshold outcomes when it
//! ends, without ever slowing down or failing the run it measures.
//!
//! ## Features
//!
//! - **Non-blocking ingestion**: producers only touch a short-lived lock; all
//!   network I/O happens on the flush loop
//! - **Lifecycle ordering**: registration before any metric, final flush before
//!   the end-of-run report
//! - **Fail-open**: a rejected registration or a failed push is logged, never
//!   propagated to the workload
//! - **Pluggable transport**: the collector only depends on [`CloudApi`]; the
//!   reqwest-backed [`Client`] is feature-gated (`http-client`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skyrelay::prelude::*;
//! use std::sync::Arc;
//!
//! # #[cfg(feature = "http-client")]
//! # async fn example() {
//! let options = RunOptions::default();
//! let mut collector = Collector::from_options("scripts/smoke.js", &options, skyrelay::VERSION);
//! collector.init().await.ok();
//! println!("{}", collector);
//!
//! let collector = Arc::new(collector);
//! let cancel = CancellationToken::new();
//! let flush = {
//!     let collector = Arc::clone(&collector);
//!     let cancel = cancel.clone();
//!     tokio::spawn(async move { collector.run(cancel).await })
//! };
//!
//! collector.collect(&[Sample::new("http_reqs", MetricType::Counter, 1.0)]);
//!
//! cancel.cancel();
//! flush.await.ok();
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`core`]: samples, thresholds, the buffer, and the collector itself
//! - [`cloud`]: the service boundary ([`CloudApi`]), wire types and HTTP client
//! - [`config`]: run options and resolved collector settings

// ============================================================================
// Modules
// ============================================================================

pub mod cloud;
pub mod config;
pub mod core;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Core types
pub use crate::core::buffer::SampleBuffer;
pub use crate::core::collector::Collector;
pub use crate::core::registrar::RunRegistrar;
pub use crate::core::sample::{MetricType, Sample};
pub use crate::core::threshold::{Threshold, ThresholdResult, ThresholdTracker};

// Service boundary
pub use crate::cloud::{CloudApi, CloudError, CloudSample, CreateTestRunResponse, ReferenceId, TestRun};

// Configuration
pub use crate::config::{CollectorConfig, ExternalConfig, RunOptions, Stage, derive_duration};

// ============================================================================
// HTTP Client Feature
// ============================================================================

#[cfg(feature = "http-client")]
pub use crate::cloud::{Client, ClientConfig};

// ============================================================================
// Prelude
// ============================================================================

/// Everything an engine needs to wire a collector into a run.
///
/// # Example
/// ```rust
/// use skyrelay::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "http-client")]
    pub use super::{Client, ClientConfig};
    pub use super::{
        CloudApi, CloudError, Collector, CollectorConfig, MetricType, RunOptions, Sample, Stage,
        Threshold, ThresholdTracker,
    };
    pub use tokio_util::sync::CancellationToken;
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use tokio_util::sync::CancellationToken;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
