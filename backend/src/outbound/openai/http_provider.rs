//! Reqwest-backed image edit provider adapter.
//!
//! This adapter owns transport details only: multipart request assembly,
//! bearer authentication, timeout and HTTP error mapping, and JSON decoding
//! into domain edit results.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use tracing::debug;

use super::credential::ApiKey;
use super::dto::{ImageEditResponseDto, ProviderErrorEnvelopeDto};
use crate::domain::ports::{ImageEditProvider, ImageEditProviderError};
use crate::domain::{EditRequest, EditResult, EncodedImage};

/// Default provider base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default image model.
pub const DEFAULT_MODEL: &str = "gpt-image-1";
/// Default output size.
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const EDITS_PATH: &str = "images/edits";
const FALLBACK_FILE_NAME: &str = "image.png";
const FALLBACK_CONTENT_TYPE: &str = "image/png";

/// Errors raised while constructing the adapter.
#[derive(Debug, thiserror::Error)]
pub enum OpenAiProviderBuildError {
    /// The reqwest client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    /// The configured base URL cannot host the edits endpoint.
    #[error("invalid provider base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

/// Request shaping options for the provider.
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    /// API root, for example `https://api.openai.com/v1`.
    pub base_url: String,
    /// Image model name.
    pub model: String,
    /// Output size such as `1024x1024`.
    pub image_size: String,
    /// Per-request timeout enforced by the HTTP client.
    pub timeout: Duration,
}

impl Default for OpenAiProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            image_size: DEFAULT_IMAGE_SIZE.to_owned(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Provider adapter posting multipart edits to `{base_url}/images/edits`.
pub struct OpenAiImageEditProvider {
    client: Client,
    endpoint: Url,
    api_key: ApiKey,
    model: String,
    image_size: String,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl OpenAiImageEditProvider {
    /// Build an adapter using a reqwest client with the configured timeout.
    /// ```rust,ignore
    /// let provider = OpenAiImageEditProvider::new(config, api_key, Arc::new(DefaultClock));
    /// assert!(provider.is_ok() || provider.is_err());
    /// ```
    /// # Errors
    ///
    /// Returns an error when the client cannot be constructed or the base URL
    /// does not parse.
    pub fn new(
        config: OpenAiProviderConfig,
        api_key: ApiKey,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self, OpenAiProviderBuildError> {
        let endpoint = edits_endpoint(&config.base_url)?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model,
            image_size: config.image_size,
            clock,
        })
    }

    /// Endpoint receiving edit requests.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn build_form(&self, request: &EditRequest) -> Result<Form, ImageEditProviderError> {
        let image = request.image();
        let length = u64::try_from(image.len()).map_err(|error| {
            ImageEditProviderError::transport(format!("image length overflow: {error}"))
        })?;
        let part = Part::stream_with_length(image.data().clone(), length)
            .file_name(image.file_name().unwrap_or(FALLBACK_FILE_NAME).to_owned())
            .mime_str(image.content_type().unwrap_or(FALLBACK_CONTENT_TYPE))
            .map_err(|error| {
                ImageEditProviderError::transport(format!("invalid image content type: {error}"))
            })?;
        Ok(Form::new()
            .text("model", self.model.clone())
            .text("prompt", request.prompt().to_string())
            .text("n", "1")
            .text("size", self.image_size.clone())
            .part("image", part))
    }

    fn prepare(&self, request: &EditRequest) -> Result<RequestBuilder, ImageEditProviderError> {
        let form = self.build_form(request)?;
        Ok(self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose())
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form))
    }
}

#[async_trait]
impl ImageEditProvider for OpenAiImageEditProvider {
    async fn edit(&self, request: &EditRequest) -> Result<EditResult, ImageEditProviderError> {
        let prepared = self.prepare(request)?;
        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            image_bytes = request.image().len(),
            "sending image edit request"
        );
        let response = prepared.send().await.map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        parse_result(body.as_ref(), request, self.clock.utc())
    }
}

fn edits_endpoint(base_url: &str) -> Result<Url, url::ParseError> {
    let root = base_url.trim().trim_end_matches('/');
    Url::parse(&format!("{root}/{EDITS_PATH}"))
}

fn parse_result(
    body: &[u8],
    request: &EditRequest,
    now: DateTime<Utc>,
) -> Result<EditResult, ImageEditProviderError> {
    let mut decoded: ImageEditResponseDto = serde_json::from_slice(body).map_err(|error| {
        ImageEditProviderError::decode(format!("invalid image edit JSON payload: {error}"))
    })?;
    let encoded = decoded
        .take_first_image()
        .ok_or_else(ImageEditProviderError::missing_image_data)?;
    let created_at = decoded
        .created
        .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
        .unwrap_or(now);

    Ok(EditResult {
        image: EncodedImage::new(encoded),
        usage: decoded.usage,
        style: request.style().clone(),
        prompt: request.prompt().clone(),
        created_at,
    })
}

fn map_transport_error(error: reqwest::Error) -> ImageEditProviderError {
    if error.is_timeout() {
        ImageEditProviderError::transport(format!("request timed out: {error}"))
    } else {
        ImageEditProviderError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> ImageEditProviderError {
    let envelope = ProviderErrorEnvelopeDto::parse(body);
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS if envelope.is_insufficient_quota() => {
            ImageEditProviderError::rejected(status.as_u16(), message)
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            ImageEditProviderError::overloaded(message)
        }
        _ if envelope.signals_overload() => ImageEditProviderError::overloaded(message),
        _ => ImageEditProviderError::rejected(status.as_u16(), message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut chars = compact.chars();
    let preview = chars.by_ref().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if chars.next().is_some() {
        format!("{preview}...")
    } else {
        preview
    }
}
