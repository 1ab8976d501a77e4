use std::fmt;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Board,
    Column,
    Card,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Board => "board",
            Entity::Column => "column",
            Entity::Card => "card",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KanbanError {
    /// Also used when the requester does not own the board, so the two cases
    /// cannot be told apart.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("domain violation: {0}")]
    DomainViolation(String),

    #[error("precondition required: {0}")]
    PreconditionRequired(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The move that triggered the rebalance is already committed.
    #[error("rank rebalance of column {column_id} failed after {attempts} attempts; please retry")]
    RebalanceFailed { column_id: String, attempts: u32 },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KanbanError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        KanbanError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            KanbanError::NotFound { .. } => "NOT_FOUND",
            KanbanError::DomainViolation(_) | KanbanError::BadRequest(_) => "BAD_REQUEST",
            KanbanError::PreconditionRequired(_) => "PRECONDITION_REQUIRED",
            KanbanError::Conflict(_) => "CONFLICT",
            KanbanError::RebalanceFailed { .. } => "REBALANCE_FAILED",
            KanbanError::Unauthorized(_) => "UNAUTHORIZED",
            KanbanError::Cancelled => "CANCELLED",
            KanbanError::Internal(_)
            | KanbanError::Database(_)
            | KanbanError::Serialization(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Whether resubmitting the whole move may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KanbanError::Conflict(_) | KanbanError::RebalanceFailed { .. }
        )
    }
}

impl From<JsonRejection> for KanbanError {
    fn from(rejection: JsonRejection) -> Self {
        KanbanError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for KanbanError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            KanbanError::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            KanbanError::DomainViolation(msg) | KanbanError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            KanbanError::PreconditionRequired(msg) => {
                (StatusCode::PRECONDITION_REQUIRED, msg.clone())
            }
            KanbanError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            KanbanError::RebalanceFailed { .. } => (StatusCode::CONFLICT, self.to_string()),
            KanbanError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            KanbanError::Cancelled => (StatusCode::REQUEST_TIMEOUT, self.to_string()),
            KanbanError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
            KanbanError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
            KanbanError::Serialization(err) => {
                tracing::error!("Serialization error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": self.code(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
