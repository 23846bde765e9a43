//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ImageEditService;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Image edit use case.
    pub image_edit: Arc<ImageEditService>,
}

impl HttpState {
    /// Construct state around the image edit service.
    ///
    /// # Examples
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use backend::domain::ports::NoOpEditPipelineMetrics;
    /// use backend::domain::{EditPipeline, EditPipelineConfig, ImageEditService, ImageEditServiceConfig};
    /// use backend::inbound::http::state::HttpState;
    ///
    /// let pipeline = Arc::new(EditPipeline::new(
    ///     Arc::new(NoOpEditPipelineMetrics),
    ///     EditPipelineConfig::default(),
    /// ));
    /// let service = ImageEditService::new(None, pipeline, ImageEditServiceConfig::default());
    /// let state = HttpState::new(Arc::new(service));
    /// assert!(!state.image_edit.is_configured());
    /// ```
    pub fn new(image_edit: Arc<ImageEditService>) -> Self {
        Self { image_edit }
    }
}
