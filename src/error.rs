use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::payment::GatewayError;
use crate::services::reconcile::ReconcileError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized access")]
    Unauthenticated,

    #[error("forbidden access")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("database error")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Gateway(GatewayError::Rejected(_)) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::CourtNotFound(_) | ReconcileError::BookingNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            ReconcileError::EmailMismatch(_) => AppError::BadRequest(err.to_string()),
            ReconcileError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!("request failed: {:?}", self);
            json!({ "error": self.to_string() })
        } else {
            json!({ "message": self.to_string() })
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Store(StoreError::Unavailable("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::Gateway(GatewayError::CircuitOpen).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::Gateway(GatewayError::Rejected("amount too small".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn client_errors_use_message_body() {
        let response = AppError::bad_request("email is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "email is required");
    }

    #[tokio::test]
    async fn server_errors_use_error_body() {
        let response = AppError::Store(StoreError::Unavailable("down".into())).into_response();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "database error");
    }
}
