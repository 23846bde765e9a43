//! Driven port for the remote image edit provider.
//!
//! One call to [`ImageEditProvider::edit`] is one provider request and one
//! unit of provider quota. Retry decisions belong to the edit pipeline, which
//! only needs to know whether a failure is a transient overload.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{EditRequest, EditResult};

define_port_error! {
    /// Errors surfaced while calling the image edit provider.
    pub enum ImageEditProviderError {
        /// Provider signalled a transient overload (rate limit or busy).
        Overloaded {
            /// Provider-supplied reason.
            message: String,
        } =>
            "image edit provider overloaded: {message}",
        /// Provider rejected the request with a non-retryable status.
        Rejected {
            /// HTTP status returned by the provider.
            status: u16,
            /// Compacted preview of the response body.
            message: String,
        } =>
            "image edit provider rejected request with status {status}: {message}",
        /// Network transport failed before receiving a response.
        Transport {
            /// Underlying transport error.
            message: String,
        } =>
            "image edit provider transport failed: {message}",
        /// Provider response could not be decoded.
        Decode {
            /// Decoder error.
            message: String,
        } =>
            "image edit provider response decode failed: {message}",
        /// Provider response carried no edited image.
        MissingImageData =>
            "image edit provider returned no image data",
    }
}

impl ImageEditProviderError {
    /// Return whether the failure is a transient overload worth retrying.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::ports::ImageEditProviderError;
    ///
    /// assert!(ImageEditProviderError::overloaded("busy").is_overload());
    /// assert!(!ImageEditProviderError::missing_image_data().is_overload());
    /// ```
    pub fn is_overload(&self) -> bool {
        matches!(self, Self::Overloaded { .. })
    }
}

/// Port for submitting one edit to the remote provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageEditProvider: Send + Sync {
    /// Perform exactly one provider call for `request`.
    ///
    /// Transient overloads must be reported as
    /// [`ImageEditProviderError::Overloaded`] so the pipeline can retry them.
    async fn edit(&self, request: &EditRequest) -> Result<EditResult, ImageEditProviderError>;
}
