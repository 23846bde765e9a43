//! Transport-agnostic entry point for image edit submissions.
//!
//! The service checks configuration, validates and defaults the submission,
//! runs the edit pipeline against the request's cancellation gate, and maps
//! every outcome onto the domain [`Error`] taxonomy.

use std::sync::Arc;

use tracing::{error, info};

use crate::domain::ports::ImageEditProvider;
use crate::domain::{
    CancellationGate, EditPipeline, EditPipelineError, EditPrompt, EditRequest,
    EditRequestValidationError, EditResult, EditStyle, EditSubmission, Error, SourceImage,
};

/// Default upload ceiling for the source image.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Message returned when no provider credential is configured.
pub const NOT_CONFIGURED_MESSAGE: &str = "Image edit provider credential is not configured";

/// Message returned when the caller abandons the request.
pub const CANCELLED_MESSAGE: &str = "Request cancelled by user";

/// Message returned for every other failure.
pub const FAILED_MESSAGE: &str = "Failed to process image edit";

/// Submission defaults and limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEditServiceConfig {
    /// Prompt applied when the submission has no usable prompt.
    pub default_prompt: EditPrompt,
    /// Largest accepted image payload in bytes.
    pub max_image_bytes: usize,
}

impl Default for ImageEditServiceConfig {
    fn default() -> Self {
        Self {
            default_prompt: EditPrompt::default(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Image edit use case.
///
/// # Examples
/// ```rust,ignore
/// let service = ImageEditService::new(Some(provider), pipeline, ImageEditServiceConfig::default());
/// let result = service.handle(submission, &CancellationGate::new()).await?;
/// ```
#[derive(Clone)]
pub struct ImageEditService {
    provider: Option<Arc<dyn ImageEditProvider>>,
    pipeline: Arc<EditPipeline>,
    config: ImageEditServiceConfig,
}

impl ImageEditService {
    /// Build the service. `provider` is `None` when no credential is
    /// configured; every request then fails with a configuration error.
    pub fn new(
        provider: Option<Arc<dyn ImageEditProvider>>,
        pipeline: Arc<EditPipeline>,
        config: ImageEditServiceConfig,
    ) -> Self {
        Self {
            provider,
            pipeline,
            config,
        }
    }

    /// Whether a provider is configured.
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Upload ceiling enforced on the image payload.
    pub fn max_image_bytes(&self) -> usize {
        self.config.max_image_bytes
    }

    /// Process one submission.
    pub async fn handle(
        &self,
        submission: EditSubmission,
        gate: &CancellationGate,
    ) -> Result<EditResult, Error> {
        let Some(provider) = self.provider.as_deref() else {
            error!("image edit requested but no provider credential is configured");
            return Err(Error::not_configured(NOT_CONFIGURED_MESSAGE));
        };

        let request = self.build_request(submission)?;
        info!(
            image_bytes = request.image().len(),
            style = %request.style(),
            "image edit request accepted"
        );

        match self.pipeline.run(provider, &request, gate).await {
            Ok(report) => Ok(report.result),
            Err(EditPipelineError::Cancelled { .. }) => Err(Error::cancelled(CANCELLED_MESSAGE)),
            Err(failure) => {
                error!(error = %failure, attempts = failure.attempts(), "image edit failed");
                Err(Error::internal(FAILED_MESSAGE))
            }
        }
    }

    fn build_request(&self, submission: EditSubmission) -> Result<EditRequest, Error> {
        let EditSubmission {
            image,
            image_content_type,
            image_file_name,
            prompt,
            style,
        } = submission;

        let data = image.unwrap_or_default();
        if data.len() > self.config.max_image_bytes {
            return Err(Error::invalid_request(format!(
                "Image exceeds the {} byte limit",
                self.config.max_image_bytes
            ))
            .with_details(serde_json::json!({
                "field": "image",
                "maxBytes": self.config.max_image_bytes,
            })));
        }

        let mut image = SourceImage::new(data).map_err(map_validation_error)?;
        if let Some(content_type) = image_content_type {
            image = image.with_content_type(content_type);
        }
        if let Some(file_name) = image_file_name {
            image = image.with_file_name(file_name);
        }

        let prompt = prompt
            .and_then(|raw| EditPrompt::new(raw).ok())
            .unwrap_or_else(|| self.config.default_prompt.clone());
        let style = style
            .and_then(|raw| EditStyle::new(raw).ok())
            .unwrap_or_default();

        Ok(EditRequest::new(image, prompt, style))
    }
}

fn map_validation_error(error: EditRequestValidationError) -> Error {
    let field = match error {
        EditRequestValidationError::MissingImage => "image",
        EditRequestValidationError::EmptyPrompt => "prompt",
        EditRequestValidationError::EmptyStyle => "style",
    };
    Error::invalid_request(error.to_string()).with_details(serde_json::json!({ "field": field }))
}
