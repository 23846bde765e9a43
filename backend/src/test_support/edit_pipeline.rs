//! Shared test doubles for edit pipeline and image edit service tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use mockable::Clock;
use tokio::sync::Notify;

use crate::domain::ports::{
    EditAttemptStatus, EditPipelineMetrics, EditPipelineMetricsError, EditRequestOutcome,
    ImageEditProvider, ImageEditProviderError,
};
use crate::domain::{
    BackoffSleeper, EditPrompt, EditRequest, EditResult, EditStyle, EncodedImage,
    OverloadClassifier, OverloadDecision, SourceImage,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("{name} mutex"),
    }
}

/// Build a small valid edit request.
pub fn sample_request() -> EditRequest {
    let image = match SourceImage::new(vec![0x89_u8, b'P', b'N', b'G']) {
        Ok(image) => image.with_content_type("image/png").with_file_name("photo.png"),
        Err(error) => panic!("sample image: {error}"),
    };
    let prompt = match EditPrompt::new("Add warm film grain") {
        Ok(prompt) => prompt,
        Err(error) => panic!("sample prompt: {error}"),
    };
    EditRequest::new(image, prompt, EditStyle::default())
}

/// Build a result echoing `request`, encoded as `encoded`.
pub fn sample_result(request: &EditRequest, encoded: &str) -> EditResult {
    EditResult {
        image: EncodedImage::new(encoded),
        usage: None,
        style: request.style().clone(),
        prompt: request.prompt().clone(),
        created_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

/// Clock pinned to a single instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Sleeper that returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateSleeper;

#[async_trait]
impl BackoffSleeper for ImmediateSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper(pub Mutex<Vec<Duration>>);

impl RecordingSleeper {
    /// Delays requested so far.
    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.0, "sleeper").clone()
    }
}

#[async_trait]
impl BackoffSleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.0, "sleeper").push(duration);
    }
}

/// Sleeper that records delays, signals entry, and never completes.
#[derive(Default)]
pub struct PendingSleeper {
    delays: Mutex<Vec<Duration>>,
    entered: Notify,
}

impl PendingSleeper {
    /// Wait until a sleep has started.
    pub async fn wait_until_sleeping(&self) {
        self.entered.notified().await;
    }

    /// Delays requested so far.
    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.delays, "sleeper").clone()
    }
}

#[async_trait]
impl BackoffSleeper for PendingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.delays, "sleeper").push(duration);
        self.entered.notify_one();
        std::future::pending::<()>().await;
    }
}

/// Classifier replaying a fixed decision sequence, then proceeding.
#[derive(Default)]
pub struct ScriptedClassifier {
    decisions: Mutex<VecDeque<OverloadDecision>>,
    consulted: Mutex<Vec<u32>>,
}

impl ScriptedClassifier {
    /// Replay `decisions` in order.
    pub fn new(decisions: impl IntoIterator<Item = OverloadDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into_iter().collect()),
            consulted: Mutex::new(Vec::new()),
        }
    }

    /// Attempt numbers the classifier was consulted for.
    pub fn consulted(&self) -> Vec<u32> {
        lock(&self.consulted, "classifier").clone()
    }
}

impl OverloadClassifier for ScriptedClassifier {
    fn classify(&self, attempt: u32) -> OverloadDecision {
        lock(&self.consulted, "classifier").push(attempt);
        lock(&self.decisions, "classifier")
            .pop_front()
            .unwrap_or(OverloadDecision::Proceed)
    }
}

/// Scripted provider outcome; `Ok` carries the encoded image.
pub type ScriptedOutcome = Result<String, ImageEditProviderError>;

/// Provider replaying scripted outcomes and counting calls.
///
/// When the script runs out every further call succeeds with `"ZmluYWw="`.
/// A blocking provider parks each call until released.
#[derive(Default)]
pub struct ScriptedProvider {
    scripted: Mutex<VecDeque<ScriptedOutcome>>,
    calls: AtomicUsize,
    entered: Option<Arc<Notify>>,
    release: Option<Arc<Notify>>,
}

impl ScriptedProvider {
    /// Replay `outcomes` in order; `Ok` carries the encoded image.
    pub fn scripted(outcomes: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
        Self {
            scripted: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Always succeed with `encoded`.
    pub fn succeeding(encoded: &str) -> Self {
        Self::scripted([Ok(encoded.to_owned())])
    }

    /// Park every call until `release` is notified, signalling `entered`
    /// when a call starts.
    pub fn blocking(entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            entered: Some(entered),
            release: Some(release),
            ..Self::default()
        }
    }

    /// Calls started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageEditProvider for ScriptedProvider {
    async fn edit(&self, request: &EditRequest) -> Result<EditResult, ImageEditProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(entered) = &self.entered {
            entered.notify_one();
        }
        if let Some(release) = &self.release {
            release.notified().await;
        }
        let next = lock(&self.scripted, "provider")
            .pop_front()
            .unwrap_or_else(|| Ok("ZmluYWw=".to_owned()));
        next.map(|encoded| sample_result(request, &encoded))
    }
}

/// Metrics double recording every write.
#[derive(Default)]
pub struct RecordingMetrics {
    attempts: Mutex<Vec<EditAttemptStatus>>,
    outcomes: Mutex<Vec<EditRequestOutcome>>,
}

impl RecordingMetrics {
    /// Attempt statuses recorded so far.
    pub fn attempts(&self) -> Vec<EditAttemptStatus> {
        lock(&self.attempts, "metrics").clone()
    }

    /// Request outcomes recorded so far.
    pub fn outcomes(&self) -> Vec<EditRequestOutcome> {
        lock(&self.outcomes, "metrics").clone()
    }
}

#[async_trait]
impl EditPipelineMetrics for RecordingMetrics {
    async fn record_attempt(
        &self,
        status: EditAttemptStatus,
    ) -> Result<(), EditPipelineMetricsError> {
        lock(&self.attempts, "metrics").push(status);
        Ok(())
    }

    async fn record_outcome(
        &self,
        outcome: &EditRequestOutcome,
    ) -> Result<(), EditPipelineMetricsError> {
        lock(&self.outcomes, "metrics").push(outcome.clone());
        Ok(())
    }
}
