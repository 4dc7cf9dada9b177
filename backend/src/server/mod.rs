//! Server construction, middleware wiring and background jobs.

mod config;
mod state_builders;

pub use config::ServerConfig;
pub use state_builders::{Services, build_services};

use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use mockable::Clock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use pos_backend::Trace;
#[cfg(debug_assertions)]
use pos_backend::doc::ApiDoc;
use pos_backend::domain::backup::BackupJob;
use pos_backend::domain::mirror::MirrorJob;
use pos_backend::domain::schedule::{Schedule, ScheduleDriver, ScheduledJob};
use pos_backend::inbound::http::api_routes;
use pos_backend::inbound::http::health::{HealthState, live, ready};
use pos_backend::inbound::http::state::HttpState;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
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
    } = deps;

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .service(web::scope("/api/v1").configure(api_routes))
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Construct an Actix HTTP server over the given services.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    services: &Services,
    config: &ServerConfig,
) -> std::io::Result<Server> {
    let http_state = web::Data::new(services.http_state());
    let server_health_state = health_state.clone();

    let server = HttpServer::new(move || {
        build_app(AppDependencies {
            health_state: server_health_state.clone(),
            http_state: http_state.clone(),
        })
    })
    .bind(config.bind_addr())?
    .run();

    health_state.mark_ready();
    info!(bind_addr = %config.bind_addr(), "http server listening");
    Ok(server)
}

fn spawn_driver(
    job: Arc<dyn ScheduledJob>,
    schedule: Schedule,
    config: &ServerConfig,
    clock: Arc<dyn Clock>,
    run_immediately: bool,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let driver = ScheduleDriver::new(job, schedule, config.backup_policy.offset, clock);
    let driver = if run_immediately {
        driver.run_immediately()
    } else {
        driver
    };
    tokio::spawn(async move { driver.run(cancel).await })
}

/// Start the scheduled backup and mirror drivers.
///
/// Drivers stop once `cancel` fires; await the returned handles to let an
/// in-flight run finish.
pub fn spawn_schedulers(
    services: &Services,
    config: &ServerConfig,
    clock: Arc<dyn Clock>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    if config.backup_policy.schedule_enabled {
        handles.push(spawn_driver(
            Arc::new(BackupJob::new(services.backups.clone())),
            config.backup_policy.schedule,
            config,
            clock.clone(),
            false,
            cancel.clone(),
        ));
    } else {
        info!("scheduled backups disabled");
    }
    if config.mirror_enabled {
        handles.push(spawn_driver(
            Arc::new(MirrorJob::new(services.mirror.clone())),
            config.mirror_schedule,
            config,
            clock,
            true,
            cancel.clone(),
        ));
    } else {
        info!("mirror syncer disabled");
    }
    handles
}
