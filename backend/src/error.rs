//! Error handling for the consignment settlement platform
//!
//! Provides consistent error responses in English and Portuguese

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use shared::InvalidTransition;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_pt: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_pt: String,
    },

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_pt: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid item state: {0}")]
    InvalidItemState(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Suitcase {suitcase_id} still holds {remaining} item(s) after cleanup")]
    InconsistentCleanup { suitcase_id: Uuid, remaining: i64 },

    // Storage errors
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a field validation failure with the same text in both languages
    pub fn validation(field: &str, message: &str, message_pt: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_pt: message_pt.to_string(),
        }
    }

    /// Missing or unusable credentials on a protected route
    pub fn unauthorized(message: &str, message_pt: &str) -> Self {
        AppError::Unauthorized {
            message: message.to_string(),
            message_pt: message_pt.to_string(),
        }
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::InvalidItemState(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let (field, message) = field_errors
            .iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("input".to_string(), "Invalid input".to_string()));

        AppError::Validation {
            message_pt: format!("Dados inválidos: {}", message),
            field,
            message,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_pt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_TOKEN".to_string(),
                    message_en: "Invalid token".to_string(),
                    message_pt: "Token inválido".to_string(),
                    field: None,
                },
            ),
            AppError::Unauthorized { message, message_pt } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "UNAUTHORIZED".to_string(),
                    message_en: message.clone(),
                    message_pt: message_pt.clone(),
                    field: None,
                },
            ),
            AppError::PermissionDenied(action) => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "PERMISSION_DENIED".to_string(),
                    message_en: format!("You do not have permission to {}", action),
                    message_pt: format!("Você não tem permissão para {}", action),
                    field: None,
                },
            ),
            AppError::Validation {
                field,
                message,
                message_pt,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_pt: message_pt.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::Conflict {
                resource,
                message,
                message_pt,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_pt: message_pt.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_pt: format!("{} não encontrado", resource),
                    field: None,
                },
            ),
            AppError::InvalidItemState(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_ITEM_STATE".to_string(),
                    message_en: msg.clone(),
                    message_pt: format!("Estado do item não permite a operação: {}", msg),
                    field: None,
                },
            ),
            AppError::InsufficientStock(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_STOCK".to_string(),
                    message_en: msg.clone(),
                    message_pt: format!("Estoque insuficiente: {}", msg),
                    field: None,
                },
            ),
            AppError::InconsistentCleanup {
                suitcase_id,
                remaining,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "INCONSISTENT_CLEANUP".to_string(),
                    message_en: format!(
                        "Suitcase {} still holds {} item(s); retry the reconciliation",
                        suitcase_id, remaining
                    ),
                    message_pt: format!(
                        "A maleta {} ainda possui {} item(ns); tente a conciliação novamente",
                        suitcase_id, remaining
                    ),
                    field: None,
                },
            ),
            AppError::PersistenceFailure(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "PERSISTENCE_FAILURE".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_pt: "Ocorreu um erro no banco de dados".to_string(),
                    field: None,
                },
            ),
            AppError::Storage(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail {
                    code: "STORAGE_ERROR".to_string(),
                    message_en: format!("Storage error: {}", msg),
                    message_pt: format!("Erro de armazenamento: {}", msg),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_pt: "Erro interno do servidor".to_string(),
                    field: None,
                },
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
