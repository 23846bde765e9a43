//! Prometheus adapter for image edit pipeline counters.
//!
//! Two counter families are exported: one increment per provider attempt and
//! one per finished request, each labelled by status.

use async_trait::async_trait;
use prometheus::{IntCounterVec, Opts, Registry};

use crate::domain::ports::{
    EditAttemptStatus, EditPipelineMetrics, EditPipelineMetricsError, EditRequestOutcome,
};

/// Prometheus-backed recorder for edit attempts and request outcomes.
///
/// # Metric Specification
///
/// - `image_edit_attempts_total{status}`: `succeeded`, `overloaded`,
///   `failed`, or `cancelled`
/// - `image_edit_requests_total{status}`: `succeeded`, `cancelled`,
///   `retries_exhausted`, or `provider_failed`
pub struct PrometheusEditPipelineMetrics {
    attempts_total: IntCounterVec,
    requests_total: IntCounterVec,
}

impl PrometheusEditPipelineMetrics {
    /// Create and register counters with the provided registry.
    ///
    /// # Errors
    ///
    /// Returns an error when Prometheus rejects metric registration.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let attempts_total = IntCounterVec::new(
            Opts::new("image_edit_attempts_total", "Provider attempts by status"),
            &["status"],
        )?;
        let requests_total = IntCounterVec::new(
            Opts::new("image_edit_requests_total", "Image edit requests by final status"),
            &["status"],
        )?;
        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(requests_total.clone()))?;
        Ok(Self {
            attempts_total,
            requests_total,
        })
    }
}

#[async_trait]
impl EditPipelineMetrics for PrometheusEditPipelineMetrics {
    async fn record_attempt(
        &self,
        status: EditAttemptStatus,
    ) -> Result<(), EditPipelineMetricsError> {
        self.attempts_total
            .get_metric_with_label_values(&[status.as_label()])
            .map_err(|error| EditPipelineMetricsError::export(error.to_string()))?
            .inc();
        Ok(())
    }

    async fn record_outcome(
        &self,
        outcome: &EditRequestOutcome,
    ) -> Result<(), EditPipelineMetricsError> {
        self.requests_total
            .get_metric_with_label_values(&[outcome.status.as_label()])
            .map_err(|error| EditPipelineMetricsError::export(error.to_string()))?
            .inc();
        Ok(())
    }
}
