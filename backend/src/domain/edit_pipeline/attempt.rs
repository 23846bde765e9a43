//! Attempt-local outcomes for one pass of the retry loop.
//!
//! Keeping these states private lets the loop branch on retryability without
//! exposing attempt-control details in the public error type.

use crate::domain::ports::ImageEditProviderError;

pub(super) enum AttemptError {
    /// Classified as overloaded before the provider was called.
    ClassifiedOverload,
    /// Provider reported a transient overload.
    ProviderOverload(ImageEditProviderError),
    /// Provider failed with a non-retryable error.
    ProviderFailed(ImageEditProviderError),
    /// Cancellation won the race against the provider call.
    Aborted,
}

impl AttemptError {
    pub(super) fn describe(&self) -> String {
        match self {
            Self::ClassifiedOverload => "provider classified as overloaded".to_owned(),
            Self::ProviderOverload(error) | Self::ProviderFailed(error) => error.to_string(),
            Self::Aborted => "attempt aborted".to_owned(),
        }
    }
}
