//! Domain port surface for image edit outcome counters.
//!
//! The pipeline reports attempts and final outcomes here; adapters decide how
//! to export them.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording edit pipeline metrics.
    pub enum EditPipelineMetricsError {
        /// Metric exporter rejected the write.
        Export {
            /// Exporter error.
            message: String,
        } =>
            "edit pipeline metrics exporter failed: {message}",
    }
}

/// Outcome label for a single provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditAttemptStatus {
    /// Provider returned an edited image.
    Succeeded,
    /// Attempt was classified or reported as a transient overload.
    Overloaded,
    /// Provider failed with a non-retryable error.
    Failed,
    /// Cancellation won the race against the attempt.
    Cancelled,
}

impl EditAttemptStatus {
    /// Stable label used by exporters.
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Overloaded => "overloaded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Final outcome label for one edit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditRequestStatus {
    /// Request completed with an edited image.
    Succeeded,
    /// Request was cancelled by the caller.
    Cancelled,
    /// Retry budget ran out on transient overloads.
    RetriesExhausted,
    /// Provider failed with a non-retryable error.
    ProviderFailed,
}

impl EditRequestStatus {
    /// Stable label used by exporters.
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Cancelled => "cancelled",
            Self::RetriesExhausted => "retries_exhausted",
            Self::ProviderFailed => "provider_failed",
        }
    }
}

/// Final outcome payload for one edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequestOutcome {
    /// Attempts started for the request.
    pub attempt_count: u32,
    /// Outcome label.
    pub status: EditRequestStatus,
}

/// Metrics recording port for edit pipeline counters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EditPipelineMetrics: Send + Sync {
    /// Record the outcome of one provider attempt.
    async fn record_attempt(&self, status: EditAttemptStatus) -> Result<(), EditPipelineMetricsError>;

    /// Record the final outcome of one edit request.
    ///
    /// ```rust,ignore
    /// use backend::domain::ports::{
    ///     EditPipelineMetrics, EditRequestOutcome, EditRequestStatus, NoOpEditPipelineMetrics,
    /// };
    ///
    /// # async fn demo() {
    /// let metrics = NoOpEditPipelineMetrics;
    /// let outcome = EditRequestOutcome {
    ///     attempt_count: 2,
    ///     status: EditRequestStatus::Succeeded,
    /// };
    /// assert!(metrics.record_outcome(&outcome).await.is_ok());
    /// # }
    /// ```
    async fn record_outcome(
        &self,
        outcome: &EditRequestOutcome,
    ) -> Result<(), EditPipelineMetricsError>;
}

/// No-op implementation used when metrics are disabled or in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEditPipelineMetrics;

#[async_trait]
impl EditPipelineMetrics for NoOpEditPipelineMetrics {
    async fn record_attempt(
        &self,
        _status: EditAttemptStatus,
    ) -> Result<(), EditPipelineMetricsError> {
        Ok(())
    }

    async fn record_outcome(
        &self,
        _outcome: &EditRequestOutcome,
    ) -> Result<(), EditPipelineMetricsError> {
        Ok(())
    }
}
