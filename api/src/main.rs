use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, HttpServer};
use anyhow::Context;
use tracing::info;

use courier_api::{build_coordinator, create_app, telemetry, AppState};
use courier_core::{VerificationCleanupService, VerificationStore};
use courier_shared::{AppConfig, EmailConfig, Environment};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Environment specific file first; dotenvy never overrides a set variable
    let environment = Environment::from_env();
    dotenvy::from_filename(environment.env_file()).ok();
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();
    telemetry::init(&config.logging);

    info!(environment = %config.environment, "Starting Courier API server");

    EmailConfig::provider_from_env().context("Invalid e-mail provider")?;
    config.validate().context("Invalid configuration")?;

    let services = courier_infra::initialize(&config)
        .await
        .context("Failed to initialize infrastructure")?;
    let coordinator =
        build_coordinator(&config, &services).context("Failed to build delivery coordinator")?;

    let store: Arc<dyn VerificationStore> = services.store.clone();
    let cleanup = Arc::new(VerificationCleanupService::new(
        store,
        Duration::from_secs(config.dispatch.cleanup_interval_seconds),
    ));
    let cleanup_task = cleanup.start_background_task();

    let state = web::Data::new(AppState::new(coordinator));
    let max_payload_size = config.server.max_payload_size;
    let bind_address = config.server.bind_address();

    info!(address = %bind_address, transport = services.transport.provider_name(), "Server will bind");

    let mut server = HttpServer::new(move || {
        create_app(state.clone(), max_payload_size).wrap(Logger::default())
    });
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await?;

    if let Some(task) = cleanup_task {
        task.abort();
    }
    info!("Courier API server stopped");

    Ok(())
}
