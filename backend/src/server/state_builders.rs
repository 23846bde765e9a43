//! Builders wiring settings into the image edit service and HTTP state.

use std::sync::Arc;

use actix_web::web;
use mockable::DefaultClock;
use tracing::{info, warn};

use backend::domain::ports::{EditPipelineMetrics, ImageEditProvider};
use backend::domain::{
    EditPipeline, EditPipelineRuntime, ImageEditService, OverloadClassifier,
    ProviderSignalClassifier, SimulatedOverload,
};
use backend::inbound::http::state::HttpState;
use backend::outbound::openai::OpenAiImageEditProvider;
use backend::settings::AppSettings;

/// Select the overload classifier: simulated when a positive rate is
/// configured, otherwise provider signals only.
fn build_classifier(settings: &AppSettings) -> Arc<dyn OverloadClassifier> {
    match settings.simulated_overload_rate() {
        Some(rate) => {
            warn!(rate, "simulated provider overload enabled");
            Arc::new(SimulatedOverload::new(rate))
        }
        None => Arc::new(ProviderSignalClassifier),
    }
}

/// Build the provider adapter when a credential is configured.
///
/// # Errors
/// Returns [`std::io::Error`] when the HTTP client or endpoint cannot be built.
fn build_provider(settings: &AppSettings) -> std::io::Result<Option<Arc<dyn ImageEditProvider>>> {
    let Some(api_key) = settings.api_key() else {
        warn!("no provider credential configured; image edits will be rejected");
        return Ok(None);
    };
    info!(fingerprint = %api_key.fingerprint(), "provider credential loaded");
    let provider =
        OpenAiImageEditProvider::new(settings.provider_config(), api_key, Arc::new(DefaultClock))
            .map_err(|error| std::io::Error::other(format!("provider setup failed: {error}")))?;
    info!(endpoint = %provider.endpoint(), "image edit provider configured");
    Ok(Some(Arc::new(provider)))
}

/// Build the image edit service from settings and a metrics recorder.
pub(super) fn build_image_edit_service(
    settings: &AppSettings,
    metrics: Arc<dyn EditPipelineMetrics>,
) -> std::io::Result<Arc<ImageEditService>> {
    let runtime = EditPipelineRuntime::default().with_classifier(build_classifier(settings));
    let pipeline = Arc::new(EditPipeline::with_runtime(
        metrics,
        runtime,
        settings.pipeline_config(),
    ));
    Ok(Arc::new(ImageEditService::new(
        build_provider(settings)?,
        pipeline,
        settings.service_config(),
    )))
}

/// Build the shared HTTP state.
pub(super) fn build_http_state(image_edit: Arc<ImageEditService>) -> web::Data<HttpState> {
    web::Data::new(HttpState::new(image_edit))
}
