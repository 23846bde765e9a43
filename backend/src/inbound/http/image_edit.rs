//! Image edit HTTP handler.
//!
//! ```text
//! POST /api/image-edit   (multipart/form-data: image, prompt, style)
//! ```
//!
//! The credential check runs before the multipart body is read, so an
//! unconfigured server never buffers uploads. Each request gets its own
//! [`CancellationGate`]. The gate is aborted when
//! the handler future is dropped, which is how Actix signals that the client
//! went away, and the edit runs on a spawned task so the pipeline can observe
//! the abort and wind down on its own.

use actix_multipart::form::bytes::Bytes as FormBytes;
use actix_multipart::form::text::Text;
use actix_multipart::form::{MultipartForm, MultipartFormConfig};
use actix_web::{FromRequest, HttpRequest, post, web};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::domain::{
    CancellationGate, EditResult, EditSubmission, Error, FAILED_MESSAGE, NOT_CONFIGURED_MESSAGE,
    TraceId,
};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Headroom allowed on top of the image ceiling for the text parts and
/// multipart framing.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Multipart fields accepted by the edit endpoint. Unknown parts are ignored.
#[derive(Debug, MultipartForm)]
pub struct ImageEditForm {
    image: Option<FormBytes>,
    prompt: Option<Text<String>>,
    style: Option<Text<String>>,
}

impl ImageEditForm {
    fn into_submission(self) -> EditSubmission {
        let (image, image_content_type, image_file_name) = match self.image {
            Some(part) => (
                Some(part.data),
                part.content_type.map(|mime| mime.to_string()),
                part.file_name,
            ),
            None => (None, None, None),
        };
        EditSubmission {
            image,
            image_content_type,
            image_file_name,
            prompt: self.prompt.map(Text::into_inner),
            style: self.style.map(Text::into_inner),
        }
    }
}

/// OpenAPI description of the multipart request body.
#[derive(ToSchema)]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ImageEditFormSchema {
    /// Source image bytes.
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
    /// Desired edit; a default prompt applies when omitted.
    #[schema(example = "Turn this into a glossy magazine cover")]
    prompt: Option<String>,
    /// Style preset such as `editorial`, `streetwear`, or `vintage`.
    #[schema(example = "editorial")]
    style: Option<String>,
}

/// Edited image payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct EditedImagePayload {
    /// Base64-encoded PNG returned by the provider.
    pub b64_json: String,
}

/// Response payload for a completed edit.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageEditResponse {
    /// Always `true` on this payload.
    pub success: bool,
    /// Edited image.
    pub image: EditedImagePayload,
    /// Provider usage metadata, passed through unchanged.
    pub usage: Option<Value>,
    /// Style tag of the request.
    pub style: String,
    /// Prompt sent to the provider.
    pub prompt: String,
    /// Creation time as Unix seconds.
    pub created_at: i64,
}

impl From<EditResult> for ImageEditResponse {
    fn from(value: EditResult) -> Self {
        Self {
            success: true,
            image: EditedImagePayload {
                b64_json: value.image.as_ref().to_owned(),
            },
            usage: value.usage,
            style: value.style.to_string(),
            prompt: value.prompt.to_string(),
            created_at: value.created_at.timestamp(),
        }
    }
}

/// Multipart extractor configuration sized for `max_image_bytes` uploads.
///
/// Malformed or oversized bodies become `invalid_request` errors.
pub fn image_edit_form_config(max_image_bytes: usize) -> MultipartFormConfig {
    let limit = max_image_bytes.saturating_add(FORM_OVERHEAD_BYTES);
    MultipartFormConfig::default()
        .total_limit(limit)
        .memory_limit(limit)
        .error_handler(|err, _req: &HttpRequest| {
            warn!(error = %err, "rejected multipart image edit form");
            Error::invalid_request("Invalid multipart form")
                .with_details(json!({ "reason": err.to_string() }))
                .into()
        })
}

/// Submit an image edit.
#[utoipa::path(
    post,
    path = "/api/image-edit",
    request_body(content = ImageEditFormSchema, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Edited image", body = ImageEditResponse),
        (status = 400, description = "Missing image or malformed form", body = ErrorSchema),
        (status = 499, description = "Client cancelled the request", body = ErrorSchema),
        (status = 500, description = "Provider not configured or edit failed", body = ErrorSchema)
    ),
    tags = ["image-edit"],
    operation_id = "editImage"
)]
#[post("/api/image-edit")]
pub async fn edit_image(
    state: web::Data<HttpState>,
    req: HttpRequest,
    payload: web::Payload,
) -> actix_web::Result<web::Json<ImageEditResponse>> {
    if !state.image_edit.is_configured() {
        error!("image edit requested but no provider credential is configured");
        return Err(Error::not_configured(NOT_CONFIGURED_MESSAGE).into());
    }

    let MultipartForm(form) =
        MultipartForm::<ImageEditForm>::from_request(&req, &mut payload.into_inner()).await?;
    let submission = form.into_submission();
    let gate = CancellationGate::new();
    let abort_on_disconnect = gate.abort_on_drop();

    let service = state.image_edit.clone();
    let task = actix_web::rt::spawn(TraceId::propagate(async move {
        service.handle(submission, &gate).await
    }));

    let outcome = task.await.map_err(|join_error| {
        error!(error = %join_error, "image edit task failed");
        Error::internal(FAILED_MESSAGE)
    })?;
    abort_on_disconnect.disarm();

    let result = outcome?;
    Ok(web::Json(ImageEditResponse::from(result)))
}
