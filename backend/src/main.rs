//! Backend entry-point: loads settings, wires the image edit service, and
//! serves the HTTP API.

mod server;

use actix_web::web;
#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetricsBuilder;
use color_eyre::eyre::{Result, eyre};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use backend::inbound::http::health::HealthState;
use backend::settings::AppSettings;
use server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings =
        AppSettings::load().map_err(|error| eyre!("failed to load settings: {error}"))?;
    let bind_addr = settings.bind_addr()?;
    info!(
        %bind_addr,
        max_attempts = settings.pipeline_config().max_attempts,
        credential_configured = settings.api_key().is_some(),
        "starting restyle backend"
    );

    let config = ServerConfig::new(settings, bind_addr);
    #[cfg(feature = "metrics")]
    let config = config.with_metrics(Some(make_metrics()?));

    let listen_addr = config.bind_addr();
    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config)?;
    info!(%listen_addr, "listening");
    server.await?;
    Ok(())
}

#[cfg(feature = "metrics")]
fn make_metrics() -> Result<actix_web_prom::PrometheusMetrics> {
    PrometheusMetricsBuilder::new("restyle")
        .endpoint("/metrics")
        .build()
        .map_err(|error| eyre!("failed to configure Prometheus metrics: {error}"))
}
