//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod edit_pipeline_metrics;
mod image_edit_provider;

#[cfg(test)]
pub use edit_pipeline_metrics::MockEditPipelineMetrics;
pub use edit_pipeline_metrics::{
    EditAttemptStatus, EditPipelineMetrics, EditPipelineMetricsError, EditRequestOutcome,
    EditRequestStatus, NoOpEditPipelineMetrics,
};
#[cfg(test)]
pub use image_edit_provider::MockImageEditProvider;
pub use image_edit_provider::{ImageEditProvider, ImageEditProviderError};
