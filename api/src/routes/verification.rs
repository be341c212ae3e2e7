//! Verification code endpoints

use actix_web::{web, HttpResponse};
use validator::Validate;

use courier_core::{DispatchStatus, DomainError, Purpose};
use courier_shared::ErrorResponse;

use crate::app::AppState;
use crate::dto::{CheckRequest, CheckResponse, DispatchRequest, DispatchResponse};
use crate::handlers::error::domain_status;
use crate::handlers::ApiError;

/// Handler for POST /api/v1/verification/dispatch
///
/// # Request Body
///
/// ```json
/// { "recipient": "jane@example.com", "purpose": "signup_verify" }
/// ```
///
/// # Responses
///
/// * `200` - delivered, or debounced because a code was sent moments ago
/// * `400` - invalid recipient or purpose
/// * `429` - per-recipient quota exhausted, see `Retry-After`
/// * `502`/`503` - delivery failed; the issued code stays valid until it expires
pub async fn dispatch(
    state: web::Data<AppState>,
    request: web::Json<DispatchRequest>,
) -> Result<HttpResponse, ApiError> {
    request.validate()?;
    let purpose: Purpose = request.purpose.parse()?;

    let outcome = state
        .coordinator
        .dispatch(&request.recipient, purpose)
        .await?;

    let body = DispatchResponse::from(&outcome);
    match (outcome.status, &outcome.error) {
        (DispatchStatus::Failed, Some(error)) => {
            let response = ErrorResponse::new(error.error_code(), body.message.clone())
                .add_detail("request_id", body.request_id)
                .add_detail("attempts", body.attempts)
                .add_detail("expires_at", body.expires_at)
                .add_detail("retryable", matches!(error, DomainError::TransientDelivery { .. }));
            Ok(HttpResponse::build(domain_status(error)).json(response))
        }
        _ => Ok(HttpResponse::Ok().json(body)),
    }
}

/// Handler for POST /api/v1/verification/check
///
/// Wrong, expired and already used codes are reported in the body with `200`;
/// only malformed requests are errors.
pub async fn check(
    state: web::Data<AppState>,
    request: web::Json<CheckRequest>,
) -> Result<HttpResponse, ApiError> {
    request.validate()?;
    let purpose: Purpose = request.purpose.parse()?;

    let outcome = state
        .coordinator
        .check_code(&request.recipient, purpose, &request.code)
        .await?;

    Ok(HttpResponse::Ok().json(CheckResponse::from(outcome)))
}
