//! Runtime dependency bundle for the edit pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::BackoffSleeper;
use super::classifier::{OverloadClassifier, ProviderSignalClassifier};

/// Runtime helpers used by the retry loop.
pub struct EditPipelineRuntime {
    /// Async sleep implementation for backoff waits.
    pub sleeper: Arc<dyn BackoffSleeper>,
    /// Pre-call overload classification.
    pub classifier: Arc<dyn OverloadClassifier>,
}

impl EditPipelineRuntime {
    /// Replace the classifier, keeping the sleeper.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn OverloadClassifier>) -> Self {
        self.classifier = classifier;
        self
    }
}

impl Default for EditPipelineRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            classifier: Arc::new(ProviderSignalClassifier),
        }
    }
}

/// Tokio-based sleeper implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl BackoffSleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
