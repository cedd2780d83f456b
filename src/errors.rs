use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Unauthorized: {0}")]
    Forbidden(String),

    #[error("Cannot {attempted} while order is {current}")]
    InvalidTransition { current: String, attempted: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NotFound",
            AppError::Unauthenticated(_) => "Unauthenticated",
            AppError::Forbidden(_) => "Unauthorized",
            AppError::InvalidTransition { .. } => "InvalidTransition",
            AppError::InvalidState(_) => "InvalidState",
            AppError::Conflict(_) => "Conflict",
            AppError::Validation(_) => "ValidationError",
            AppError::Internal(_) => "Internal",
        }
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound(msg) => AppError::NotFound(msg),
            DomainError::InvalidTransition { current, attempted } => {
                AppError::InvalidTransition { current, attempted }
            }
            DomainError::InvalidState(msg) => AppError::InvalidState(msg),
            DomainError::Unauthorized(msg) => AppError::Forbidden(msg),
            DomainError::Conflict(msg) => AppError::Conflict(msg),
            DomainError::Validation(msg) => AppError::Validation(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidTransition { .. } | AppError::InvalidState(_) | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::InvalidTransition { current, attempted } => json!({
                "error": self.to_string(),
                "kind": self.kind(),
                "currentState": current,
                "attempted": attempted,
            }),
            AppError::Internal(msg) => {
                log::error!("internal error: {msg}");
                json!({
                    "error": "Internal server error",
                    "kind": self.kind(),
                })
            }
            _ => json!({
                "error": self.to_string(),
                "kind": self.kind(),
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::ResponseError;

    async fn body_of(err: AppError) -> serde_json::Value {
        let bytes = to_bytes(err.error_response().into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn not_found_returns_404() {
        let resp = AppError::NotFound("order 1".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn lifecycle_errors_return_409() {
        for err in [
            AppError::InvalidTransition {
                current: "Pending".to_string(),
                attempted: "mark-ready".to_string(),
            },
            AppError::InvalidState("farmer must sign first".to_string()),
            AppError::Conflict("order moved".to_string()),
        ] {
            assert_eq!(err.error_response().status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn auth_errors_split_401_and_403() {
        assert_eq!(
            AppError::Unauthenticated("missing token".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("wrong role".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn validation_returns_400() {
        assert_eq!(
            AppError::Validation("reason is required".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_error_returns_500() {
        let err = AppError::Internal("something went wrong".to_string());
        assert_eq!(
            err.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn invalid_transition_body_carries_state_and_action() {
        let body = body_of(AppError::InvalidTransition {
            current: "Both Agreed".to_string(),
            attempted: "mark-ready".to_string(),
        })
        .await;
        assert_eq!(body["kind"], "InvalidTransition");
        assert_eq!(body["currentState"], "Both Agreed");
        assert_eq!(body["attempted"], "mark-ready");
        assert_eq!(body["error"], "Cannot mark-ready while order is Both Agreed");
    }

    #[actix_web::test]
    async fn internal_error_message_is_hidden() {
        let body = body_of(AppError::Internal("connection refused".to_string())).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["kind"], "Internal");
    }

    #[test]
    fn domain_errors_map_by_kind() {
        let app_err: AppError = DomainError::NotFound("x".to_string()).into();
        assert!(matches!(app_err, AppError::NotFound(_)));

        let app_err: AppError = DomainError::Unauthorized("x".to_string()).into();
        assert!(matches!(app_err, AppError::Forbidden(_)));
        assert_eq!(app_err.kind(), "Unauthorized");

        let app_err: AppError = DomainError::Validation("x".to_string()).into();
        assert_eq!(app_err.kind(), "ValidationError");

        let app_err: AppError = DomainError::invalid_transition("Rejected", "cancel").into();
        assert!(matches!(
            app_err,
            AppError::InvalidTransition { ref current, ref attempted }
                if current == "Rejected" && attempted == "cancel"
        ));
    }

    #[test]
    fn internal_error_display() {
        assert_eq!(
            AppError::Internal("msg".to_string()).to_string(),
            "Internal error: msg"
        );
    }
}
