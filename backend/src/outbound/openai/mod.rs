//! OpenAI-compatible image edit adapter.
//!
//! This module provides a thin HTTP implementation of the
//! `ImageEditProvider` port together with its credential type.

mod credential;
mod dto;
mod http_provider;

pub use credential::ApiKey;
pub use http_provider::{
    DEFAULT_BASE_URL, DEFAULT_IMAGE_SIZE, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT,
    OpenAiImageEditProvider, OpenAiProviderBuildError, OpenAiProviderConfig,
};
