//! Application state and factory
//!
//! This module wires the coordinator out of the infrastructure services and
//! provides the factory for creating the Actix-web application.

use std::sync::Arc;

use actix_web::{web, App, HttpResponse};

use courier_core::{
    DeliveryCoordinator, DomainResult, RateLimiter, TemplateRenderer, Transport,
    VerificationServiceConfig, VerificationStore,
};
use courier_infra::InfrastructureServices;
use courier_shared::{error_codes, AppConfig, ErrorResponse};

use crate::handlers::json_error_handler;
use crate::routes::{health, verification};

/// Coordinator over the collaborators selected at startup
pub type Dispatcher = DeliveryCoordinator<dyn Transport, dyn VerificationStore, dyn RateLimiter>;

/// Application state that holds shared services
pub struct AppState {
    pub coordinator: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(coordinator: Arc<Dispatcher>) -> Self {
        Self { coordinator }
    }
}

/// Build the coordinator from configuration and infrastructure
///
/// Fails when the code settings are invalid or a purpose has no template.
pub fn build_coordinator(
    config: &AppConfig,
    services: &InfrastructureServices,
) -> DomainResult<Arc<Dispatcher>> {
    let store: Arc<dyn VerificationStore> = services.store.clone();
    let coordinator = DeliveryCoordinator::new(
        Arc::clone(&services.transport),
        store,
        Arc::clone(&services.rate_limiter),
        TemplateRenderer::with_default_templates(&config.email.app_name),
        VerificationServiceConfig::try_from(&config.dispatch)?,
    )?;
    Ok(Arc::new(coordinator))
}

/// Create and configure the application
pub fn create_app(
    app_state: web::Data<AppState>,
    max_payload_size: usize,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(app_state)
        .app_data(
            web::JsonConfig::default()
                .limit(max_payload_size)
                .error_handler(json_error_handler),
        )
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api/v1/verification")
                .route("/dispatch", web::post().to(verification::dispatch))
                .route("/check", web::post().to(verification::check)),
        )
        .default_service(web::route().to(not_found))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::new(
        error_codes::NOT_FOUND,
        "The requested resource was not found",
    ))
}
