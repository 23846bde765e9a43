//! Server construction and middleware wiring.

mod config;
#[cfg(feature = "metrics")]
mod metrics;
mod state_builders;

pub use config::ServerConfig;

#[cfg(feature = "metrics")]
use metrics::MetricsLayer;
use state_builders::{build_http_state, build_image_edit_service};

use actix_multipart::form::MultipartFormConfig;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use backend::Trace;
#[cfg(debug_assertions)]
use backend::doc::ApiDoc;
use backend::domain::ports::{EditPipelineMetrics, NoOpEditPipelineMetrics};
use backend::inbound::http::health::{HealthState, live, ready};
use backend::inbound::http::image_edit::{edit_image, image_edit_form_config};
use backend::inbound::http::state::HttpState;
#[cfg(feature = "metrics")]
use backend::outbound::metrics::PrometheusEditPipelineMetrics;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use std::sync::Arc;

/// Build the pipeline metrics recorder.
///
/// Counters are registered on the Prometheus registry when one is configured;
/// otherwise a no-op recorder is used.
///
/// # Errors
/// Returns [`std::io::Error`] if Prometheus metric registration fails.
#[cfg(feature = "metrics")]
fn build_pipeline_metrics(config: &ServerConfig) -> std::io::Result<Arc<dyn EditPipelineMetrics>> {
    match &config.prometheus {
        Some(prom) => {
            let metrics = PrometheusEditPipelineMetrics::new(&prom.registry).map_err(|e| {
                std::io::Error::other(format!("edit pipeline metrics registration failed: {e}"))
            })?;
            Ok(Arc::new(metrics))
        }
        None => Ok(Arc::new(NoOpEditPipelineMetrics)),
    }
}

/// Build the pipeline metrics recorder. Without the metrics feature a no-op
/// recorder is always used.
#[cfg(not(feature = "metrics"))]
fn build_pipeline_metrics(
    _config: &ServerConfig,
) -> std::io::Result<Arc<dyn EditPipelineMetrics>> {
    Ok(Arc::new(NoOpEditPipelineMetrics))
}

struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    form_config: MultipartFormConfig,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
        form_config,
    } = deps;

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(form_config)
        .wrap(Trace)
        .service(edit_image)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    #[cfg(not(debug_assertions))]
    let app = app;

    app
}

/// Construct an Actix HTTP server using the provided health state and configuration.
///
/// # Parameters
/// - `health_state`: shared readiness state updated once the server is initialised.
/// - `config`: pre-built [`ServerConfig`] containing settings, binding, and optional metrics.
///
/// # Returns
/// A spawned [`Server`] that must be awaited to drive the listener.
///
/// # Errors
/// Propagates [`std::io::Error`] when building the provider, binding the
/// socket, or starting the server fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let server_health_state = health_state.clone();
    let metrics = build_pipeline_metrics(&config)?;
    let image_edit = build_image_edit_service(&config.settings, metrics)?;
    let max_image_bytes = image_edit.max_image_bytes();
    let http_state = build_http_state(image_edit);
    let ServerConfig {
        bind_addr,
        settings: _,
        #[cfg(feature = "metrics")]
        prometheus,
    } = config;

    #[cfg(feature = "metrics")]
    let metrics_layer = MetricsLayer::from_option(prometheus);

    let server = HttpServer::new(move || {
        let app = build_app(AppDependencies {
            health_state: server_health_state.clone(),
            http_state: http_state.clone(),
            form_config: image_edit_form_config(max_image_bytes),
        });

        #[cfg(feature = "metrics")]
        let app = app.wrap(metrics_layer.clone());

        app
    })
    .bind(bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use backend::domain::TRACE_ID_HEADER;
    use backend::settings::AppSettings;
    use backend::test_support::multipart::MultipartBody;
    use rstest::rstest;

    fn deps(settings: &AppSettings) -> AppDependencies {
        let image_edit = build_image_edit_service(settings, Arc::new(NoOpEditPipelineMetrics))
            .expect("service builds");
        let health = HealthState::new();
        health.mark_ready();
        AppDependencies {
            health_state: web::Data::new(health),
            form_config: image_edit_form_config(image_edit.max_image_bytes()),
            http_state: build_http_state(image_edit),
        }
    }

    #[rstest]
    #[actix_web::test]
    async fn probes_are_mounted() {
        let app = test::init_service(build_app(deps(&AppSettings::default()))).await;
        for uri in ["/health/ready", "/health/live"] {
            let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(res.status(), StatusCode::OK, "{uri} should be healthy");
            assert!(res.headers().contains_key(TRACE_ID_HEADER));
        }
    }

    #[rstest]
    #[actix_web::test]
    async fn edit_without_credential_reports_configuration_error() {
        let app = test::init_service(build_app(deps(&AppSettings::default()))).await;
        let body = MultipartBody::new()
            .file("image", "cat.png", "image/png", b"\x89PNG")
            .finish();
        let req = test::TestRequest::post()
            .uri("/api/image-edit")
            .insert_header(("content-type", MultipartBody::content_type()))
            .set_payload(body)
            .to_request();

        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let trace_id = res
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .expect("trace id header");
        let payload: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(payload["code"], "not_configured");
        assert_eq!(payload["traceId"], trace_id.as_str());
    }
}
