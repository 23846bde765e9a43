//! Unit tests for the edit pipeline retry loop.

use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};
use tokio::sync::Notify;
use tokio::time::timeout;

use super::*;
use crate::domain::ports::{MockEditPipelineMetrics, EditPipelineMetricsError};
use crate::test_support::edit_pipeline::{
    ImmediateSleeper, PendingSleeper, RecordingMetrics, RecordingSleeper, ScriptedClassifier,
    ScriptedProvider, sample_request,
};

struct Harness {
    pipeline: EditPipeline,
    sleeper: Arc<RecordingSleeper>,
    classifier: Arc<ScriptedClassifier>,
    metrics: Arc<RecordingMetrics>,
}

fn harness(decisions: Vec<OverloadDecision>, max_attempts: u32) -> Harness {
    let sleeper = Arc::new(RecordingSleeper::default());
    let classifier = Arc::new(ScriptedClassifier::new(decisions));
    let metrics = Arc::new(RecordingMetrics::default());
    let pipeline = EditPipeline::with_runtime(
        metrics.clone(),
        EditPipelineRuntime {
            sleeper: sleeper.clone(),
            classifier: classifier.clone(),
        },
        EditPipelineConfig {
            max_attempts,
            ..EditPipelineConfig::default()
        },
    );
    Harness {
        pipeline,
        sleeper,
        classifier,
        metrics,
    }
}

#[fixture]
fn gate() -> CancellationGate {
    CancellationGate::new()
}

#[rstest]
#[tokio::test]
async fn first_attempt_success_calls_provider_once(gate: CancellationGate) {
    let harness = harness(Vec::new(), 3);
    let provider = ScriptedProvider::succeeding("Zmlyc3Q=");
    let request = sample_request();

    let report = harness
        .pipeline
        .run(&provider, &request, &gate)
        .await
        .expect("edit succeeds");

    assert_eq!(report.attempts, 1);
    assert_eq!(report.result.image.as_ref(), "Zmlyc3Q=");
    assert_eq!(provider.calls(), 1);
    assert!(harness.sleeper.recorded().is_empty());
    assert_eq!(
        harness.metrics.outcomes(),
        vec![EditRequestOutcome {
            attempt_count: 1,
            status: EditRequestStatus::Succeeded,
        }]
    );
}

#[rstest]
#[tokio::test]
async fn classified_overloads_back_off_exponentially(gate: CancellationGate) {
    let harness = harness(
        vec![OverloadDecision::Overloaded, OverloadDecision::Overloaded],
        3,
    );
    let provider = ScriptedProvider::succeeding("dGhpcmQ=");
    let request = sample_request();

    let report = harness
        .pipeline
        .run(&provider, &request, &gate)
        .await
        .expect("third attempt succeeds");

    assert_eq!(report.attempts, 3);
    assert_eq!(report.result.image.as_ref(), "dGhpcmQ=");
    assert_eq!(provider.calls(), 1);
    assert_eq!(
        harness.sleeper.recorded(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert_eq!(harness.classifier.consulted(), vec![1, 2]);
}

#[rstest]
#[tokio::test]
async fn classifier_is_not_consulted_on_final_attempt(gate: CancellationGate) {
    let harness = harness(vec![OverloadDecision::Overloaded; 5], 2);
    let provider = ScriptedProvider::succeeding("bGFzdA==");

    let report = harness
        .pipeline
        .run(&provider, &sample_request(), &gate)
        .await
        .expect("final attempt reaches the provider");

    assert_eq!(report.attempts, 2);
    assert_eq!(harness.classifier.consulted(), vec![1]);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(4)]
#[tokio::test]
async fn repeated_provider_overload_exhausts_after_max_attempts(
    gate: CancellationGate,
    #[case] max_attempts: u32,
) {
    let harness = harness(Vec::new(), max_attempts);
    let provider = ScriptedProvider::scripted(
        (0..max_attempts).map(|_| Err(ImageEditProviderError::overloaded("429 Too Many Requests"))),
    );

    let error = harness
        .pipeline
        .run(&provider, &sample_request(), &gate)
        .await
        .expect_err("overload persists");

    assert!(matches!(
        error,
        EditPipelineError::RetriesExhausted { attempts, .. } if attempts == max_attempts
    ));
    assert_eq!(provider.calls(), max_attempts as usize);
    assert_eq!(
        harness.sleeper.recorded().len(),
        (max_attempts - 1) as usize
    );
}

#[rstest]
#[tokio::test]
async fn zero_max_attempts_still_runs_once(gate: CancellationGate) {
    let harness = harness(Vec::new(), 0);
    let provider = ScriptedProvider::succeeding("b25jZQ==");

    let report = harness
        .pipeline
        .run(&provider, &sample_request(), &gate)
        .await
        .expect("single attempt");

    assert_eq!(report.attempts, 1);
}

#[rstest]
#[tokio::test]
async fn non_retryable_failure_stops_immediately(gate: CancellationGate) {
    let harness = harness(Vec::new(), 3);
    let provider = ScriptedProvider::scripted([Err(ImageEditProviderError::rejected(
        400_u16,
        "invalid image",
    ))]);

    let error = harness
        .pipeline
        .run(&provider, &sample_request(), &gate)
        .await
        .expect_err("rejection is fatal");

    assert_eq!(
        error,
        EditPipelineError::Provider {
            attempts: 1,
            source: ImageEditProviderError::rejected(400_u16, "invalid image"),
        }
    );
    assert_eq!(provider.calls(), 1);
    assert!(harness.sleeper.recorded().is_empty());
    assert_eq!(harness.metrics.attempts(), vec![EditAttemptStatus::Failed]);
}

#[rstest]
#[tokio::test]
async fn provider_overload_then_success_retries(gate: CancellationGate) {
    let harness = harness(Vec::new(), 3);
    let provider = ScriptedProvider::scripted([
        Err(ImageEditProviderError::overloaded("503")),
        Ok("c2Vjb25k".to_owned()),
    ]);

    let report = harness
        .pipeline
        .run(&provider, &sample_request(), &gate)
        .await
        .expect("second attempt succeeds");

    assert_eq!(report.attempts, 2);
    assert_eq!(provider.calls(), 2);
    assert_eq!(harness.sleeper.recorded(), vec![Duration::from_secs(2)]);
    assert_eq!(
        harness.metrics.attempts(),
        vec![EditAttemptStatus::Overloaded, EditAttemptStatus::Succeeded]
    );
}

#[rstest]
#[tokio::test]
async fn already_aborted_gate_never_calls_provider(gate: CancellationGate) {
    let harness = harness(Vec::new(), 3);
    let provider = ScriptedProvider::succeeding("dW51c2Vk");
    gate.abort();

    let error = harness
        .pipeline
        .run(&provider, &sample_request(), &gate)
        .await
        .expect_err("gate already aborted");

    assert_eq!(error, EditPipelineError::Cancelled { attempts: 0 });
    assert_eq!(provider.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn cancellation_during_backoff_skips_next_attempt(gate: CancellationGate) {
    let sleeper = Arc::new(PendingSleeper::default());
    let pipeline = Arc::new(EditPipeline::with_runtime(
        Arc::new(RecordingMetrics::default()),
        EditPipelineRuntime {
            sleeper: sleeper.clone(),
            classifier: Arc::new(ScriptedClassifier::new([OverloadDecision::Overloaded])),
        },
        EditPipelineConfig::default(),
    ));
    let provider = Arc::new(ScriptedProvider::succeeding("bmV2ZXI="));

    let task = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        let provider = Arc::clone(&provider);
        let gate = gate.clone();
        async move {
            pipeline
                .run(provider.as_ref(), &sample_request(), &gate)
                .await
        }
    });

    sleeper.wait_until_sleeping().await;
    gate.abort();

    let outcome = timeout(Duration::from_secs(1), task)
        .await
        .expect("pipeline returns promptly")
        .expect("task completes");
    assert_eq!(outcome, Err(EditPipelineError::Cancelled { attempts: 1 }));
    assert_eq!(provider.calls(), 0);
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(2)]);
}

#[rstest]
#[tokio::test]
async fn cancellation_during_provider_call_returns_without_waiting(gate: CancellationGate) {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let provider = Arc::new(ScriptedProvider::blocking(entered.clone(), release));
    let pipeline = Arc::new(EditPipeline::with_runtime(
        Arc::new(RecordingMetrics::default()),
        EditPipelineRuntime {
            sleeper: Arc::new(ImmediateSleeper),
            classifier: Arc::new(ProviderSignalClassifier),
        },
        EditPipelineConfig::default(),
    ));

    let task = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        let provider = Arc::clone(&provider);
        let gate = gate.clone();
        async move {
            pipeline
                .run(provider.as_ref(), &sample_request(), &gate)
                .await
        }
    });

    entered.notified().await;
    gate.abort();

    let outcome = timeout(Duration::from_secs(1), task)
        .await
        .expect("pipeline returns promptly")
        .expect("task completes");
    assert_eq!(outcome, Err(EditPipelineError::Cancelled { attempts: 1 }));
    assert_eq!(provider.calls(), 1);
}

#[rstest]
#[tokio::test]
async fn rerun_after_cancellation_starts_fresh(gate: CancellationGate) {
    let harness = harness(Vec::new(), 3);
    let provider = ScriptedProvider::succeeding("ZnJlc2g=");
    let request = sample_request();
    gate.abort();

    let cancelled = harness.pipeline.run(&provider, &request, &gate).await;
    assert!(matches!(cancelled, Err(EditPipelineError::Cancelled { .. })));

    let report = harness
        .pipeline
        .run(&provider, &request, &CancellationGate::new())
        .await
        .expect("fresh gate succeeds");
    assert_eq!(report.attempts, 1);
    assert_eq!(provider.calls(), 1);
}

#[rstest]
fn backoff_is_capped_by_max_backoff() {
    let pipeline = EditPipeline::new(
        Arc::new(RecordingMetrics::default()),
        EditPipelineConfig {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
        },
    );

    let delays: Vec<_> = (1..=6).map(|attempt| pipeline.retry_delay(attempt)).collect();

    assert_eq!(
        delays,
        [2, 4, 8, 16, 30, 30].map(Duration::from_secs).to_vec()
    );
}

#[rstest]
#[tokio::test]
async fn metrics_failures_do_not_change_outcome(gate: CancellationGate) {
    let mut metrics = MockEditPipelineMetrics::new();
    metrics
        .expect_record_attempt()
        .returning(|_| Err(EditPipelineMetricsError::export("exporter down")));
    metrics
        .expect_record_outcome()
        .times(1)
        .returning(|_| Err(EditPipelineMetricsError::export("exporter down")));
    let pipeline = EditPipeline::with_runtime(
        Arc::new(metrics),
        EditPipelineRuntime {
            sleeper: Arc::new(ImmediateSleeper),
            classifier: Arc::new(ProviderSignalClassifier),
        },
        EditPipelineConfig::default(),
    );
    let provider = ScriptedProvider::succeeding("b2s=");

    let report = pipeline
        .run(&provider, &sample_request(), &gate)
        .await
        .expect("metrics errors are ignored");

    assert_eq!(report.attempts, 1);
}
