use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Plain confirmation body, e.g. `{"message": "Conta excluída com sucesso."}`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

pub fn message_response(message: impl Into<String>) -> Response {
    success_response(MessageResponse {
        message: message.into(),
    })
}

/// Path ids that are not UUIDs cannot name an existing record
pub fn parse_id(raw: &str, not_found: &str) -> Result<uuid::Uuid, crate::errors::ServiceError> {
    uuid::Uuid::parse_str(raw.trim())
        .map_err(|_| crate::errors::ServiceError::NotFound(not_found.to_string()))
}
