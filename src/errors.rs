use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("data not found")]
    NotFound,

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => AppError::NotFound,
            DomainError::InvalidTransition(msg) => AppError::InvalidTransition(msg),
            DomainError::InvalidInput(msg) => AppError::BadRequest(msg),
            DomainError::Unauthorized(msg) => AppError::Unauthorized(msg),
            DomainError::UpstreamUnavailable(msg)
            | DomainError::Cancelled(msg)
            | DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::NotFound => self.to_string(),
            AppError::InvalidTransition(_) => "Invalid status transition".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            AppError::Internal(detail) => {
                error!("{}", detail);
                "Internal server error".to_string()
            }
        };
        HttpResponse::build(self.status_code()).json(json!({
            "message": message,
            "data": null
        }))
    }
}
