//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del ciclo de vida de
//! solicitudes de recogida/entrega y su conversión a respuestas HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::delivery_request::DeliveryStatus;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("A positive collection fee must be set for this address before proposing a pickup date")]
    PricingRequired,

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("An actor cannot approve its own proposal")]
    SelfApproval,

    #[error("Active request exists: {0}")]
    ActiveRequestExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Side effect failure: {0}")]
    SideEffect(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::StoreUnavailable(e.to_string())
    }
}

impl AppError {
    /// Código estable que recibe el cliente en el campo `code`
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::PricingRequired => "PRICING_REQUIRED",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::SelfApproval => "SELF_APPROVAL",
            AppError::ActiveRequestExists(_) => "ACTIVE_REQUEST_EXISTS",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::SideEffect(_) => "SIDE_EFFECT_FAILURE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PricingRequired => StatusCode::PRECONDITION_FAILED,
            AppError::InvalidTransition(_)
            | AppError::SelfApproval
            | AppError::ActiveRequestExists(_)
            | AppError::ConcurrentModification(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::SideEffect(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        let (error, message, details) = match self {
            AppError::Validation(e) => {
                warn!("⚠️ Validation error: {}", e);
                (
                    "Validation Error",
                    "The provided data is invalid".to_string(),
                    Some(json!(e)),
                )
            }

            AppError::BadRequest(msg) => {
                warn!("⚠️ Bad request: {}", msg);
                ("Bad Request", msg, None)
            }

            e @ AppError::PricingRequired => {
                warn!("💶 Pricing required: {}", e);
                ("Precondition Failed", e.to_string(), None)
            }

            AppError::InvalidTransition(msg) => {
                warn!("🚫 Invalid transition: {}", msg);
                ("Invalid Transition", msg, None)
            }

            e @ AppError::SelfApproval => {
                warn!("🚫 Self approval: {}", e);
                ("Precondition Failed", e.to_string(), None)
            }

            AppError::ActiveRequestExists(msg) => {
                warn!("🚫 Active request exists: {}", msg);
                ("Conflict", msg, None)
            }

            AppError::NotFound(msg) => {
                warn!("🔍 Resource not found: {}", msg);
                ("Not Found", msg, None)
            }

            AppError::ConcurrentModification(msg) => {
                warn!("🔁 Concurrent modification: {}", msg);
                (
                    "Concurrent Modification",
                    msg,
                    Some(json!({ "retry": "re-fetch the request and retry the operation" })),
                )
            }

            AppError::Unauthorized(msg) => {
                warn!("🔒 Unauthorized access: {}", msg);
                ("Unauthorized", msg, None)
            }

            AppError::Forbidden(msg) => {
                warn!("🔒 Forbidden access: {}", msg);
                ("Forbidden", msg, None)
            }

            AppError::StoreUnavailable(msg) => {
                error!("❌ Store unavailable: {}", msg);
                (
                    "Store Unavailable",
                    "The record store is currently unavailable".to_string(),
                    Some(json!({ "store_error": msg })),
                )
            }

            AppError::SideEffect(msg) | AppError::Internal(msg) => {
                error!("❌ Internal error: {}", msg);
                (
                    "Internal Server Error",
                    "An unexpected error occurred".to_string(),
                    Some(json!({ "internal_error": msg })),
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
            details,
            code: Some(code.to_string()),
        };

        (status, Json(body)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, message: &'static str) -> AppError {
    use validator::ValidationError;

    let mut error = ValidationError::new("custom");
    error.add_param("field".into(), &field);
    error.add_param("message".into(), &message);

    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);

    AppError::Validation(errors)
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de transición inválida
pub fn invalid_transition_error(operation: &str, from: DeliveryStatus) -> AppError {
    AppError::InvalidTransition(format!("cannot {} a request in status {}", operation, from))
}

/// Función helper para crear errores de acceso prohibido
pub fn forbidden_error(operation: &str, reason: &str) -> AppError {
    AppError::Forbidden(format!("Cannot {}: {}", operation, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_map_to_specific_codes() {
        assert_eq!(AppError::PricingRequired.code(), "PRICING_REQUIRED");
        assert_eq!(AppError::PricingRequired.status_code(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(AppError::SelfApproval.code(), "SELF_APPROVAL");
        assert_eq!(
            invalid_transition_error("approve", DeliveryStatus::Scheduled).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn sqlx_errors_become_store_unavailable() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn validation_helper_names_the_field() {
        let err = validation_error("desired_date", "must be YYYY-MM-DD");
        match err {
            AppError::Validation(errors) => {
                assert!(errors.field_errors().contains_key("desired_date"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
