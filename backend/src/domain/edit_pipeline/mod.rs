//! Retry and backoff controller for remote image edits.
//!
//! The pipeline owns the attempt loop: overload classification, exponential
//! backoff, and cooperative cancellation. Every suspending step (the provider
//! call and the backoff wait) is raced against the request's
//! [`CancellationGate`], and attempts run strictly one after another.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::ports::{
    EditAttemptStatus, EditPipelineMetrics, EditRequestOutcome, EditRequestStatus,
    ImageEditProvider, ImageEditProviderError,
};
use crate::domain::{CancellationGate, EditRequest, EditResult};

mod attempt;
mod classifier;
mod runtime;

use attempt::AttemptError;
pub use classifier::{
    OverloadClassifier, OverloadDecision, ProviderSignalClassifier, SimulatedOverload,
};
#[cfg(test)]
pub use classifier::MockOverloadClassifier;
pub use runtime::{EditPipelineRuntime, TokioSleeper};

/// Retry configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPipelineConfig {
    /// Maximum attempts per request, including the first. Values below 1 are
    /// treated as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single backoff delay.
    pub max_backoff: Duration,
}

impl Default for EditPipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Successful run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRunReport {
    /// Edited image and metadata.
    pub result: EditResult,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Terminal pipeline failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditPipelineError {
    /// The request's gate aborted before the pipeline finished.
    #[error("image edit cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Attempts started before cancellation.
        attempts: u32,
    },
    /// Every attempt ended in a transient overload.
    #[error("image edit provider still overloaded after {attempts} attempt(s): {message}")]
    RetriesExhausted {
        /// Attempts used.
        attempts: u32,
        /// Description of the final overload.
        message: String,
    },
    /// The provider failed with a non-retryable error.
    #[error("image edit failed on attempt {attempts}: {source}")]
    Provider {
        /// Attempts used, including the failing one.
        attempts: u32,
        /// Provider failure.
        #[source]
        source: ImageEditProviderError,
    },
}

impl EditPipelineError {
    /// Attempts started before the pipeline gave up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Cancelled { attempts }
            | Self::RetriesExhausted { attempts, .. }
            | Self::Provider { attempts, .. } => *attempts,
        }
    }

    /// Whether the failure is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    fn request_status(&self) -> EditRequestStatus {
        match self {
            Self::Cancelled { .. } => EditRequestStatus::Cancelled,
            Self::RetriesExhausted { .. } => EditRequestStatus::RetriesExhausted,
            Self::Provider { .. } => EditRequestStatus::ProviderFailed,
        }
    }
}

/// Async clock-independent sleeping abstraction for backoff waits.
#[async_trait]
pub trait BackoffSleeper: Send + Sync {
    /// Suspend execution for `duration`.
    ///
    /// ```rust,no_run
    /// use async_trait::async_trait;
    /// use backend::domain::BackoffSleeper;
    /// use std::sync::{Arc, Mutex};
    /// use std::time::Duration;
    /// #[derive(Default)]
    /// struct RecordingSleeper {
    ///     calls: Arc<Mutex<Vec<Duration>>>,
    /// }
    /// #[async_trait]
    /// impl BackoffSleeper for RecordingSleeper {
    ///     async fn sleep(&self, duration: Duration) {
    ///         self.calls.lock().expect("calls mutex").push(duration);
    ///     }
    /// }
    /// # async fn demo() {
    /// let sleeper = RecordingSleeper::default();
    /// sleeper.sleep(Duration::from_secs(2)).await;
    /// assert_eq!(sleeper.calls.lock().expect("calls mutex").len(), 1);
    /// # }
    /// ```
    async fn sleep(&self, duration: Duration);
}

/// Domain-owned retry controller for image edits.
///
/// Holds no per-request state: each [`EditPipeline::run`] starts counting
/// attempts at 1.
pub struct EditPipeline {
    metrics: Arc<dyn EditPipelineMetrics>,
    sleeper: Arc<dyn BackoffSleeper>,
    classifier: Arc<dyn OverloadClassifier>,
    config: EditPipelineConfig,
}

impl EditPipeline {
    /// Build a pipeline using default runtime dependencies.
    pub fn new(metrics: Arc<dyn EditPipelineMetrics>, config: EditPipelineConfig) -> Self {
        Self::with_runtime(metrics, EditPipelineRuntime::default(), config)
    }

    /// Build a pipeline with injected runtime abstractions.
    pub fn with_runtime(
        metrics: Arc<dyn EditPipelineMetrics>,
        runtime: EditPipelineRuntime,
        config: EditPipelineConfig,
    ) -> Self {
        Self {
            metrics,
            sleeper: runtime.sleeper,
            classifier: runtime.classifier,
            config,
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &EditPipelineConfig {
        &self.config
    }

    /// Drive `request` through `provider` until it succeeds, fails terminally,
    /// or `gate` aborts.
    /// ```rust,ignore
    /// let report = pipeline.run(&provider, &request, &gate).await?;
    /// assert!(report.attempts >= 1);
    /// # Ok::<(), backend::domain::EditPipelineError>(())
    /// ```
    pub async fn run(
        &self,
        provider: &dyn ImageEditProvider,
        request: &EditRequest,
        gate: &CancellationGate,
    ) -> Result<EditRunReport, EditPipelineError> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if gate.is_aborted() {
                return self.fail(EditPipelineError::Cancelled {
                    attempts: attempt - 1,
                })
                .await;
            }

            match self
                .run_single_attempt(provider, request, gate, attempt, max_attempts)
                .await
            {
                Ok(result) => {
                    self.record_attempt(EditAttemptStatus::Succeeded).await;
                    self.record_outcome(attempt, EditRequestStatus::Succeeded)
                        .await;
                    info!(attempt, "image edit succeeded");
                    return Ok(EditRunReport {
                        result,
                        attempts: attempt,
                    });
                }
                Err(error @ (AttemptError::ClassifiedOverload | AttemptError::ProviderOverload(_)))
                    if attempt < max_attempts =>
                {
                    self.record_attempt(EditAttemptStatus::Overloaded).await;
                    let delay = self.retry_delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        reason = %error.describe(),
                        "image edit provider overloaded; backing off"
                    );
                    if gate.guard(self.sleeper.sleep(delay)).await.is_err() {
                        return self
                            .fail(EditPipelineError::Cancelled { attempts: attempt })
                            .await;
                    }
                }
                Err(error @ (AttemptError::ClassifiedOverload | AttemptError::ProviderOverload(_))) => {
                    self.record_attempt(EditAttemptStatus::Overloaded).await;
                    return self
                        .fail(EditPipelineError::RetriesExhausted {
                            attempts: attempt,
                            message: error.describe(),
                        })
                        .await;
                }
                Err(AttemptError::ProviderFailed(source)) => {
                    self.record_attempt(EditAttemptStatus::Failed).await;
                    return self
                        .fail(EditPipelineError::Provider {
                            attempts: attempt,
                            source,
                        })
                        .await;
                }
                Err(AttemptError::Aborted) => {
                    self.record_attempt(EditAttemptStatus::Cancelled).await;
                    return self
                        .fail(EditPipelineError::Cancelled { attempts: attempt })
                        .await;
                }
            }
        }

        // The loop returns on every path of the final attempt.
        self.fail(EditPipelineError::RetriesExhausted {
            attempts: max_attempts,
            message: "retry loop ended without an outcome".to_owned(),
        })
        .await
    }

    async fn run_single_attempt(
        &self,
        provider: &dyn ImageEditProvider,
        request: &EditRequest,
        gate: &CancellationGate,
        attempt: u32,
        max_attempts: u32,
    ) -> Result<EditResult, AttemptError> {
        if attempt < max_attempts
            && self.classifier.classify(attempt) == OverloadDecision::Overloaded
        {
            return Err(AttemptError::ClassifiedOverload);
        }

        debug!(attempt, max_attempts, "calling image edit provider");
        match gate.guard(provider.edit(request)).await {
            Err(_aborted) => Err(AttemptError::Aborted),
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) if error.is_overload() => Err(AttemptError::ProviderOverload(error)),
            Ok(Err(error)) => Err(AttemptError::ProviderFailed(error)),
        }
    }

    async fn fail<T>(&self, error: EditPipelineError) -> Result<T, EditPipelineError> {
        match &error {
            EditPipelineError::Cancelled { attempts } => {
                info!(attempts, "image edit cancelled");
            }
            other => {
                warn!(attempts = other.attempts(), error = %other, "image edit failed");
            }
        }
        self.record_outcome(error.attempts(), error.request_status())
            .await;
        Err(error)
    }

    async fn record_attempt(&self, status: EditAttemptStatus) {
        // Exporter failures never change the request outcome.
        let _ = self.metrics.record_attempt(status).await;
    }

    async fn record_outcome(&self, attempts: u32, status: EditRequestStatus) {
        let outcome = EditRequestOutcome {
            attempt_count: attempts,
            status,
        };
        let _ = self.metrics.record_outcome(&outcome).await;
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let base_ms = u64::try_from(self.config.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.config.max_backoff.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(u64::from(exponent)).min(max_ms))
    }
}

#[cfg(test)]
mod tests;
