//! Image edit request and result primitives.
//!
//! An [`EditRequest`] is assembled once at the boundary and stays immutable
//! for the lifetime of the request. An [`EditResult`] is produced once per
//! successful request and handed back to the caller untouched.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Style applied when the submission carries no style tag.
pub const DEFAULT_EDIT_STYLE: &str = "editorial";

/// Prompt applied when the submission carries none.
pub const DEFAULT_EDIT_PROMPT: &str = "Enhance this image with beautiful styling";

/// Style presets offered by the web client.
pub const EDIT_STYLE_PRESETS: [&str; 3] = ["editorial", "streetwear", "vintage"];

/// Validation failures raised while assembling an edit request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditRequestValidationError {
    /// No image part was submitted, or it was empty.
    #[error("Image is required")]
    MissingImage,
    /// The prompt was blank after trimming.
    #[error("Prompt must not be empty")]
    EmptyPrompt,
    /// The style tag was blank after trimming.
    #[error("Style must not be empty")]
    EmptyStyle,
}

/// Uploaded source image.
///
/// ## Invariants
/// - `data` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    data: Bytes,
    content_type: Option<String>,
    file_name: Option<String>,
}

impl SourceImage {
    /// Wrap uploaded bytes, rejecting an empty payload.
    pub fn new(data: impl Into<Bytes>) -> Result<Self, EditRequestValidationError> {
        let data = data.into();
        if data.is_empty() {
            return Err(EditRequestValidationError::MissingImage);
        }
        Ok(Self {
            data,
            content_type: None,
            file_name: None,
        })
    }

    /// Record the MIME type reported by the client.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Record the original file name reported by the client.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Raw image bytes; cloning is cheap.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// MIME type reported by the client, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// File name reported by the client, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Free-text description of the desired edit.
///
/// ## Invariants
/// - Trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPrompt(String);

impl EditPrompt {
    /// Validate and trim a prompt.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::EditPrompt;
    ///
    /// let prompt = EditPrompt::new("  add a sunset  ").expect("non-empty prompt");
    /// assert_eq!(prompt.as_ref(), "add a sunset");
    /// assert!(EditPrompt::new("   ").is_err());
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Result<Self, EditRequestValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(EditRequestValidationError::EmptyPrompt);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl Default for EditPrompt {
    fn default() -> Self {
        Self(DEFAULT_EDIT_PROMPT.to_owned())
    }
}

impl AsRef<str> for EditPrompt {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for EditPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque style tag passed through to the result.
///
/// Known presets are listed in [`EDIT_STYLE_PRESETS`]; other tags are kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditStyle(String);

impl EditStyle {
    /// Validate and trim a style tag.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, EditRequestValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(EditRequestValidationError::EmptyStyle);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Whether the tag is one of the client presets.
    pub fn is_preset(&self) -> bool {
        EDIT_STYLE_PRESETS.contains(&self.0.as_str())
    }
}

impl Default for EditStyle {
    fn default() -> Self {
        Self(DEFAULT_EDIT_STYLE.to_owned())
    }
}

impl AsRef<str> for EditStyle {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for EditStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One image edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    image: SourceImage,
    prompt: EditPrompt,
    style: EditStyle,
}

impl EditRequest {
    /// Assemble a request from validated parts.
    pub fn new(image: SourceImage, prompt: EditPrompt, style: EditStyle) -> Self {
        Self {
            image,
            prompt,
            style,
        }
    }

    /// Source image to edit.
    pub fn image(&self) -> &SourceImage {
        &self.image
    }

    /// Edit description sent to the provider.
    pub fn prompt(&self) -> &EditPrompt {
        &self.prompt
    }

    /// Style tag echoed back with the result.
    pub fn style(&self) -> &EditStyle {
        &self.style
    }
}

/// Raw boundary submission before validation.
///
/// Every field is optional so the service decides which omissions are
/// errors and which get defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSubmission {
    /// Uploaded image bytes, if an `image` part was present.
    pub image: Option<Bytes>,
    /// MIME type of the image part.
    pub image_content_type: Option<String>,
    /// File name of the image part.
    pub image_file_name: Option<String>,
    /// Prompt text, if supplied.
    pub prompt: Option<String>,
    /// Style tag, if supplied.
    pub style: Option<String>,
}

/// Base64-encoded edited image as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(String);

impl EncodedImage {
    /// Wrap provider-encoded image text.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }
}

impl AsRef<str> for EncodedImage {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// Completed edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditResult {
    /// Edited image data.
    pub image: EncodedImage,
    /// Provider usage metadata, passed through opaquely.
    pub usage: Option<Value>,
    /// Style tag of the originating request.
    pub style: EditStyle,
    /// Prompt of the originating request.
    pub prompt: EditPrompt,
    /// Creation time reported by the provider.
    pub created_at: DateTime<Utc>,
}
