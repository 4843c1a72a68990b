use std::fmt;
use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::cloud::{CloudApi, CloudError, CloudSample, ReferenceId, TestRun};
use crate::config::CollectorConfig;
use crate::core::buffer::SampleBuffer;
use crate::core::registrar::RunRegistrar;
use crate::core::sample::Sample;

/// Service name shown in the status line.
const SERVICE_NAME: &str = "Skyrelay cloud";

/// Ships a run's samples and threshold outcomes to the cloud service.
///
/// Lifecycle:
/// 1. [`Collector::new`]: no I/O, cannot fail.
/// 2. [`Collector::init`]: registers the run. Takes `&mut self`, so it
///    completes before the collector can be shared.
/// 3. [`Collector::run`] on one task, [`Collector::collect`] from any
///    number of producers.
/// 4. Cancelling the token passed to `run` triggers one final flush and
///    the end-of-run report.
///
/// Telemetry is best-effort throughout. No method returns an error that
/// should stop the workload; failures are logged and, when registration
/// fails, the collector turns into a no-op for the rest of the run.
pub struct Collector {
    reference_id: Option<ReferenceId>,
    init_error: Option<CloudError>,
    config: CollectorConfig,
    registrar: RunRegistrar,
    buffer: SampleBuffer<CloudSample>,
}

impl Collector {
    /// Creates a collector that talks to the service through `api`.
    pub fn new(config: CollectorConfig, api: Arc<dyn CloudApi>) -> Self {
        Collector {
            reference_id: None,
            init_error: None,
            config,
            registrar: RunRegistrar::new(api),
            buffer: SampleBuffer::new(),
        }
    }

    /// Builds a collector backed by the HTTP client.
    ///
    /// Reads the access token from [`TOKEN_ENV_VAR`](crate::config::TOKEN_ENV_VAR)
    /// once. A missing token is not an error here; registration will be
    /// rejected later and telemetry disabled.
    #[cfg(feature = "http-client")]
    pub fn from_options(
        script_path: &str,
        options: &crate::config::RunOptions,
        version: &str,
    ) -> Self {
        use crate::cloud::client::DEFAULT_HOST;
        use crate::cloud::{Client, ClientConfig};
        use crate::config::{ExternalConfig, TOKEN_ENV_VAR};

        let token = std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty());
        let external = ExternalConfig::from_external(&options.external);

        let client_config = ClientConfig {
            token,
            host: external
                .host
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            user_agent: format!("{}/{}", crate::NAME, version),
            ..Default::default()
        };

        let config = CollectorConfig::resolve(script_path, options, &external);
        Self::new(config, Arc::new(Client::new(client_config)))
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Reference assigned at registration, if it succeeded.
    pub fn reference_id(&self) -> Option<&ReferenceId> {
        self.reference_id.as_ref()
    }

    /// Error recorded by a failed [`Collector::init`].
    pub fn init_error(&self) -> Option<&CloudError> {
        self.init_error.as_ref()
    }

    /// Number of samples waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The registration payload for this run.
    pub fn test_run(&self) -> TestRun {
        TestRun {
            name: self.config.name.clone(),
            project_id: self.config.project_id,
            thresholds: self.config.thresholds.sources(),
            duration: self.config.duration,
        }
    }

    /// Registers the run with the service.
    ///
    /// Always returns `Ok(())`. A failed registration is kept for the status
    /// line and leaves the collector without a reference, which turns every
    /// later operation into a no-op.
    pub async fn init(&mut self) -> Result<(), CloudError> {
        let run = self.test_run();
        match self.registrar.register(&run).await {
            Ok(reference_id) => {
                log::debug!(
                    "Cloud collector init successful: name={:?} project_id={} duration={} reference_id={}",
                    run.name,
                    run.project_id,
                    run.duration,
                    reference_id
                );
                self.reference_id = Some(reference_id);
            }
            Err(e) => {
                log::error!("Cloud collector failed to init: {}", e);
                self.init_error = Some(e);
            }
        }
        Ok(())
    }

    /// The collector has no warm-up phase.
    pub fn is_ready(&self) -> bool {
        true
    }

    /// Queues samples for the next flush.
    ///
    /// Returns immediately without locking when the run was never
    /// registered.
    pub fn collect(&self, samples: &[Sample]) {
        if self.reference_id.is_none() {
            return;
        }
        let batch: Vec<CloudSample> = samples.iter().map(CloudSample::from).collect();
        self.buffer.append(batch);
    }

    /// Flushes on every tick until `cancel` fires, then flushes once more and
    /// reports the run as finished.
    ///
    /// A flush already in progress when cancellation arrives runs to
    /// completion first.
    pub async fn run(&self, cancel: CancellationToken) {
        let period = if self.config.push_interval.is_zero() {
            log::warn!("Push interval is zero, using the default instead");
            crate::config::DEFAULT_PUSH_INTERVAL
        } else {
            self.config.push_interval
        };

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.push_metrics().await,
            }
        }

        self.push_metrics().await;
        self.test_finished().await;
    }

    async fn push_metrics(&self) {
        let Some(reference_id) = &self.reference_id else {
            return;
        };
        let batch = self.buffer.drain();
        if batch.is_empty() {
            return;
        }

        log::debug!("Pushing {} samples to cloud", batch.len());
        if let Err(e) = self.registrar.push(reference_id, &batch).await {
            log::warn!("Failed to send {} samples to cloud: {}", batch.len(), e);
        }
    }

    async fn test_finished(&self) {
        let Some(reference_id) = &self.reference_id else {
            return;
        };
        let (results, tainted) = self.config.thresholds.snapshot();

        log::debug!(
            "Sending test finished: reference_id={} tainted={}",
            reference_id,
            tainted
        );
        if let Err(e) = self.registrar.finish(reference_id, &results, tainted).await {
            log::warn!("Failed to send test finished to cloud: {}", e);
        }
    }
}

impl fmt::Display for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reference_id) = &self.reference_id {
            return write!(
                f,
                "{} ({}/runs/{})",
                SERVICE_NAME,
                self.config.web_app_url.trim_end_matches('/'),
                reference_id
            );
        }
        match self.init_error.as_ref().and_then(CloudError::status_text) {
            Some(text) => f.write_str(&text),
            None => write!(f, "Failed to create test run in {}", SERVICE_NAME),
        }
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("reference_id", &self.reference_id)
            .field("init_error", &self.init_error)
            .field("name", &self.config.name)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
