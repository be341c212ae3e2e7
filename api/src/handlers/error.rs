//! Mapping of domain and request errors to HTTP responses
//!
//! Every error body is a [`ErrorResponse`] with a stable `error` code.

use std::collections::HashMap;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::{header, StatusCode};
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;
use validator::ValidationErrors;

use courier_core::DomainError;
use courier_shared::{error_codes, ErrorResponse};

/// Error returned by route handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationErrors),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(error) => domain_status(error),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ApiError::Validation(errors) => {
                HttpResponse::build(status).json(validation_response(errors))
            }
            ApiError::Domain(error) => {
                if status.is_server_error() {
                    tracing::error!(error = %error, code = error.error_code(), "Request failed");
                }

                let mut builder = HttpResponse::build(status);
                let mut body = ErrorResponse::new(error.error_code(), client_message(error));
                if let DomainError::RateLimited {
                    retry_after_seconds,
                } = error
                {
                    builder.insert_header((header::RETRY_AFTER, retry_after_seconds.to_string()));
                    body = body.add_detail("retry_after_seconds", retry_after_seconds);
                }
                builder.json(body)
            }
        }
    }
}

pub(crate) fn domain_status(error: &DomainError) -> StatusCode {
    match error {
        DomainError::Validation { .. } | DomainError::UnknownTemplate { .. } => {
            StatusCode::BAD_REQUEST
        }
        DomainError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        DomainError::TransientDelivery { .. } | DomainError::Storage { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DomainError::PermanentDelivery { .. } => StatusCode::BAD_GATEWAY,
        DomainError::Configuration { .. }
        | DomainError::EntropyUnavailable { .. }
        | DomainError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Internal details stay in the logs
fn client_message(error: &DomainError) -> String {
    match error {
        DomainError::Validation { .. }
        | DomainError::UnknownTemplate { .. }
        | DomainError::RateLimited { .. } => error.to_string(),
        DomainError::TransientDelivery { .. } | DomainError::PermanentDelivery { .. } => {
            "Verification code could not be delivered".to_string()
        }
        DomainError::Storage { .. } => "Service temporarily unavailable".to_string(),
        DomainError::Configuration { .. }
        | DomainError::EntropyUnavailable { .. }
        | DomainError::Internal { .. } => "An internal error occurred".to_string(),
    }
}

fn validation_response(errors: &ValidationErrors) -> ErrorResponse {
    let field_errors = errors.field_errors();

    let code = if field_errors.contains_key("recipient") {
        error_codes::RECIPIENT_INVALID
    } else {
        error_codes::VALIDATION_ERROR
    };

    let fields: HashMap<String, Vec<String>> = field_errors
        .into_iter()
        .map(|(field, errors)| {
            let messages = errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect();

    ErrorResponse::new(code, "Invalid request data").add_detail("fields", fields)
}

/// Malformed or oversized JSON bodies answer with the standard error shape
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let status = match err {
        JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        _ => StatusCode::BAD_REQUEST,
    };
    let response = HttpResponse::build(status)
        .json(ErrorResponse::new(error_codes::BAD_REQUEST, err.to_string()));
    InternalError::from_response(err, response).into()
}
