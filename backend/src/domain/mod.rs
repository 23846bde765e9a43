//! Domain primitives, services, and ports.
//!
//! Purpose: define the strongly typed image edit model, the retry pipeline
//! that drives the remote provider, and the per-request cancellation gate.
//! Nothing here depends on HTTP or on a specific provider SDK.
//!
//! Public surface:
//! - Error (alias to `error::Error`) — transport-agnostic error payload.
//! - ErrorCode (alias to `error::ErrorCode`) — stable error identifier.
//! - CancellationGate — single-shot per-request abort signal.
//! - EditPipeline — bounded retry controller around the provider port.
//! - ImageEditService — validation, defaulting, and outcome mapping.

pub mod cancellation;
pub mod edit_pipeline;
pub mod error;
pub mod image_edit;
pub mod image_edit_service;
pub mod ports;
pub mod trace_id;

pub use self::cancellation::{AbortListener, AbortOnDrop, Aborted, CancellationGate};
#[cfg(test)]
pub use self::edit_pipeline::MockOverloadClassifier;
pub use self::edit_pipeline::{
    BackoffSleeper, EditPipeline, EditPipelineConfig, EditPipelineError, EditPipelineRuntime,
    EditRunReport, OverloadClassifier, OverloadDecision, ProviderSignalClassifier,
    SimulatedOverload, TokioSleeper,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::image_edit::{
    DEFAULT_EDIT_PROMPT, DEFAULT_EDIT_STYLE, EDIT_STYLE_PRESETS, EditPrompt, EditRequest,
    EditRequestValidationError, EditResult, EditStyle, EditSubmission, EncodedImage, SourceImage,
};
pub use self::image_edit_service::{
    CANCELLED_MESSAGE, DEFAULT_MAX_IMAGE_BYTES, FAILED_MESSAGE, ImageEditService,
    ImageEditServiceConfig, NOT_CONFIGURED_MESSAGE,
};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::invalid_request("Image is required"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
