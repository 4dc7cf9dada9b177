//! Backend entry-point: loads settings, starts the scheduled jobs and serves
//! the REST endpoints.

mod server;

use std::sync::Arc;

use actix_web::web;
use color_eyre::eyre::eyre;
use futures_util::future::join_all;
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use pos_backend::inbound::http::health::HealthState;
use pos_backend::settings::AppSettings;

use server::{ServerConfig, build_services, create_server, spawn_schedulers};

/// Install the JSON subscriber. Failures surface through `color_eyre`,
/// since no subscriber exists yet to log them.
fn init_tracing() -> color_eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .json()
        .try_init()
        .map_err(|err| eyre!("tracing init failed: {err}"))
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_tracing()?;

    let settings = AppSettings::load()?;
    let config = ServerConfig::from_settings(&settings)?;
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let services = build_services(&config, clock.clone())?;

    let drift = services.mirror.verify_schema().await;
    if !drift.is_empty() {
        warn!(tables = drift.len(), "mirror schema drift detected at startup");
    }

    let cancel = CancellationToken::new();
    let schedulers = spawn_schedulers(&services, &config, clock, &cancel);

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state.clone(), &services, &config)?;
    let served = server.await;

    health_state.mark_draining();
    cancel.cancel();
    for result in join_all(schedulers).await {
        if let Err(err) = result {
            warn!(error = %err, "scheduler task ended abnormally");
        }
    }
    info!("shutdown complete");
    served?;
    Ok(())
}
