use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::repo::RepoError;
use crate::stories::{StoryAction, StoryError};
use crate::validation::ValidationError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not found")] NotFound,
    #[error("{0}")] Unauthorized(&'static str),
    #[error("{0}")] Forbidden(&'static str),
    #[error("{0}")] Invalid(ValidationError),
    #[error("Malformed request.")] Malformed,
    #[error("too many requests")] TooManyRequests,
    #[error("{0}")] Internal(&'static str),
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Internal(cause) => {
                tracing::error!(%cause, "repository failure");
                ApiError::Internal("internal error")
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self { ApiError::Invalid(e) }
}

impl ApiError {
    /// Escalation path for story deletion, which has no structured result body.
    pub fn from_story(e: StoryError, action: StoryAction) -> Self {
        let msg = e.user_message(action);
        match e {
            StoryError::NotAuthenticated => ApiError::Unauthorized(msg),
            StoryError::StoryNotFound => ApiError::NotFound,
            StoryError::Unauthorized => ApiError::Forbidden(msg),
            StoryError::PersistFailed(_) => ApiError::Internal(msg),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;
        let status = match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Invalid(_) | ApiError::Malformed => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let (error, field) = match self {
            ApiError::Invalid(v) => (v.message.clone(), Some(v.field)),
            other => (other.to_string(), None),
        };
        HttpResponse::build(status).json(ApiErrorBody { error, field })
    }
}

/// Body extraction failures answer with the JSON error shape; the decoder's own text stays in the logs.
pub fn json_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "rejected request body");
    ApiError::Malformed.into()
}

pub fn query_error(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "rejected query string");
    ApiError::Malformed.into()
}
