//! Lifecycle tests for the collector against a recording service double.
//!
//! The flush loop runs on tokio's paused clock, so ticks fire exactly when
//! the test sleeps past them.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use skyrelay::prelude::*;
use skyrelay::{CloudSample, CreateTestRunResponse, ReferenceId, TestRun, ThresholdResult};

const INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Register(TestRun),
    Push(Vec<f64>),
    Finished(ThresholdResult, bool),
}

#[derive(Default)]
struct RecordingApi {
    calls: Mutex<Vec<Call>>,
    register_error: Mutex<Option<CloudError>>,
    failing_pushes: AtomicUsize,
}

impl RecordingApi {
    fn rejecting(err: CloudError) -> Self {
        Self {
            register_error: Mutex::new(Some(err)),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn pushes(&self) -> Vec<Vec<f64>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Push(values) => Some(values),
                _ => None,
            })
            .collect()
    }

    fn finished_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Finished(..)))
            .count()
    }
}

#[async_trait]
impl CloudApi for RecordingApi {
    async fn create_test_run(&self, run: &TestRun) -> Result<CreateTestRunResponse, CloudError> {
        self.calls.lock().unwrap().push(Call::Register(run.clone()));
        if let Some(err) = self.register_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(CreateTestRunResponse {
            reference_id: ReferenceId::new("run-1"),
        })
    }

    async fn push_metric(
        &self,
        reference_id: &ReferenceId,
        samples: &[CloudSample],
    ) -> Result<(), CloudError> {
        assert_eq!(reference_id.as_str(), "run-1");
        let values = samples.iter().map(|s| s.data.value).collect();
        self.calls.lock().unwrap().push(Call::Push(values));

        let failing = self.failing_pushes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_pushes.store(failing - 1, Ordering::SeqCst);
            return Err(CloudError::ApiError {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        Ok(())
    }

    async fn test_finished(
        &self,
        reference_id: &ReferenceId,
        thresholds: &ThresholdResult,
        tainted: bool,
    ) -> Result<(), CloudError> {
        assert_eq!(reference_id.as_str(), "run-1");
        self.calls
            .lock()
            .unwrap()
            .push(Call::Finished(thresholds.clone(), tainted));
        Ok(())
    }
}

fn samples(values: &[f64]) -> Vec<Sample> {
    values
        .iter()
        .map(|v| Sample::new("http_req_duration", MetricType::Trend, *v))
        .collect()
}

fn config() -> CollectorConfig {
    CollectorConfig::default().with_push_interval(INTERVAL)
}

async fn started(api: &Arc<RecordingApi>, config: CollectorConfig) -> Arc<Collector> {
    let mut collector = Collector::new(config, api.clone());
    collector.init().await.unwrap();
    Arc::new(collector)
}

#[tokio::test(start_paused = true)]
async fn test_collect_without_init_sends_nothing() {
    let api = Arc::new(RecordingApi::default());
    let collector = Arc::new(Collector::new(config(), api.clone()));

    for _ in 0..100 {
        collector.collect(&samples(&[1.0, 2.0]));
    }
    assert_eq!(collector.buffered(), 0);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let collector = Arc::clone(&collector);
        let cancel = cancel.clone();
        async move { collector.run(cancel).await }
    });
    tokio::time::sleep(INTERVAL * 3).await;
    cancel.cancel();
    handle.await.unwrap();

    assert!(api.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_not_authorized_disables_telemetry() {
    let api = Arc::new(RecordingApi::rejecting(CloudError::NotAuthorized));
    let collector = started(&api, config()).await;

    assert!(collector.reference_id().is_none());
    assert_eq!(collector.to_string(), CloudError::NotAuthorized.to_string());

    collector.collect(&samples(&[1.0, 2.0, 3.0]));
    assert_eq!(collector.buffered(), 0);

    let cancel = CancellationToken::new();
    cancel.cancel();
    collector.run(cancel).await;

    let calls = api.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], Call::Register(_)));
}

#[tokio::test(start_paused = true)]
async fn test_generic_init_failure_status() {
    let api = Arc::new(RecordingApi::rejecting(CloudError::ApiError {
        status: 500,
        message: "down".to_string(),
    }));
    let collector = started(&api, config()).await;

    assert_eq!(
        collector.to_string(),
        "Failed to create test run in Skyrelay cloud"
    );
    assert!(collector.init_error().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_registration_carries_run_descriptor() {
    let mut thresholds = ThresholdTracker::new();
    thresholds.track("http_req_duration", Threshold::new("p(95)<200"));
    let config = CollectorConfig {
        name: "checkout.js".to_string(),
        project_id: 12,
        duration: 120,
        thresholds,
        ..config()
    };
    let api = Arc::new(RecordingApi::default());
    let collector = started(&api, config).await;

    match &api.calls()[0] {
        Call::Register(run) => {
            assert_eq!(run.name, "checkout.js");
            assert_eq!(run.project_id, 12);
            assert_eq!(run.duration, 120);
            assert_eq!(run.thresholds["http_req_duration"], vec!["p(95)<200"]);
        }
        other => panic!("expected registration, got {:?}", other),
    }
    assert!(collector.to_string().ends_with("/runs/run-1)"));
}

#[tokio::test(start_paused = true)]
async fn test_final_flush_precedes_single_finish_notice() {
    let api = Arc::new(RecordingApi::default());
    let collector = started(&api, config()).await;

    collector.collect(&samples(&[1.0, 2.0]));
    collector.collect(&samples(&[3.0]));

    let cancel = CancellationToken::new();
    cancel.cancel();
    collector.run(cancel).await;

    let calls = api.calls();
    assert_eq!(calls.len(), 3);
    assert!(matches!(calls[0], Call::Register(_)));
    assert_eq!(calls[1], Call::Push(vec![1.0, 2.0, 3.0]));
    assert!(matches!(calls[2], Call::Finished(_, false)));
}

#[tokio::test(start_paused = true)]
async fn test_empty_buffer_skips_push_but_still_finishes() {
    let api = Arc::new(RecordingApi::default());
    let collector = started(&api, config()).await;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let collector = Arc::clone(&collector);
        let cancel = cancel.clone();
        async move { collector.run(cancel).await }
    });
    tokio::time::sleep(INTERVAL * 5 + Duration::from_millis(10)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert!(api.pushes().is_empty());
    assert_eq!(api.finished_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batches_follow_tick_order() {
    let api = Arc::new(RecordingApi::default());
    let collector = started(&api, config()).await;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let collector = Arc::clone(&collector);
        let cancel = cancel.clone();
        async move { collector.run(cancel).await }
    });

    collector.collect(&samples(&[1.0]));
    tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
    assert_eq!(api.pushes(), vec![vec![1.0]]);

    collector.collect(&samples(&[2.0, 3.0]));
    tokio::time::sleep(INTERVAL).await;
    assert_eq!(api.pushes(), vec![vec![1.0], vec![2.0, 3.0]]);

    collector.collect(&samples(&[4.0]));
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(api.pushes(), vec![vec![1.0], vec![2.0, 3.0], vec![4.0]]);
    assert!(matches!(api.calls().last(), Some(Call::Finished(..))));
    assert_eq!(api.finished_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_push_is_dropped_and_loop_continues() {
    let api = Arc::new(RecordingApi::default());
    api.failing_pushes.store(1, Ordering::SeqCst);
    let collector = started(&api, config()).await;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let collector = Arc::clone(&collector);
        let cancel = cancel.clone();
        async move { collector.run(cancel).await }
    });

    collector.collect(&samples(&[1.0]));
    tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
    collector.collect(&samples(&[2.0]));
    tokio::time::sleep(INTERVAL).await;
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(api.pushes(), vec![vec![1.0], vec![2.0]]);
    assert_eq!(api.finished_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_finish_reports_threshold_outcomes() {
    let mut thresholds = ThresholdTracker::new();
    let rate = thresholds.track("http_req_duration", Threshold::new("rate<0.1"));
    thresholds.track("http_req_duration", Threshold::new("p95<200"));
    let config = CollectorConfig {
        thresholds,
        ..config()
    };
    let api = Arc::new(RecordingApi::default());
    let collector = started(&api, config).await;

    // Verdicts land after registration, while the run is in flight.
    rate.set_failed(true);

    let cancel = CancellationToken::new();
    cancel.cancel();
    collector.run(cancel).await;

    let mut expected = ThresholdResult::new();
    let metric = expected.entry("http_req_duration".to_string()).or_default();
    metric.insert("rate<0.1".to_string(), true);
    metric.insert("p95<200".to_string(), false);

    assert_eq!(api.calls().last(), Some(&Call::Finished(expected, true)));
}

#[tokio::test(start_paused = true)]
async fn test_finish_untainted_when_all_thresholds_pass() {
    let mut thresholds = ThresholdTracker::new();
    thresholds.track("http_req_duration", Threshold::new("rate<0.1"));
    thresholds.track("http_req_duration", Threshold::new("p95<200"));
    let config = CollectorConfig {
        thresholds,
        ..config()
    };
    let api = Arc::new(RecordingApi::default());
    let collector = started(&api, config).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    collector.run(cancel).await;

    match api.calls().last() {
        Some(Call::Finished(result, tainted)) => {
            assert!(!tainted);
            assert_eq!(result["http_req_duration"].len(), 2);
        }
        other => panic!("expected finish notice, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_deliver_each_sample_once() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 500;

    let api = Arc::new(RecordingApi::default());
    let collector = started(&api, config().with_push_interval(Duration::from_millis(2))).await;

    let cancel = CancellationToken::new();
    let flush = tokio::spawn({
        let collector = Arc::clone(&collector);
        let cancel = cancel.clone();
        async move { collector.run(cancel).await }
    });

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let collector = Arc::clone(&collector);
            tokio::spawn(async move {
                for i in 0..PER_PRODUCER {
                    let value = (p * PER_PRODUCER + i) as f64;
                    collector.collect(&samples(&[value]));
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();
    for result in futures::future::join_all(producers).await {
        result.unwrap();
    }

    cancel.cancel();
    flush.await.unwrap();

    let delivered: Vec<f64> = api.pushes().into_iter().flatten().collect();
    let unique: HashSet<u64> = delivered.iter().map(|v| *v as u64).collect();
    assert_eq!(delivered.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(unique.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(api.finished_count(), 1);
    assert!(matches!(api.calls().last(), Some(Call::Finished(..))));
}
