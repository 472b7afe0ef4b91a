use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::lifecycle::LifecycleError;
use crate::reconcile::BoardError;
use crate::repo::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub kind: &'static str,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    /// Delete blocked by dependent rows. Distinct from a generic conflict:
    /// it points at the store's schema configuration, not a transient fault,
    /// and is never retried automatically.
    #[error("delete blocked by dependent records")]
    ReferentialIntegrity,
    #[error("bad request")]
    BadRequest,
    #[error("store unavailable")]
    Unavailable,
    #[error("internal error")]
    Internal,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::Forbidden => "unauthorized",
            ApiError::NotFound => "not_found",
            ApiError::Conflict => "conflict",
            ApiError::ReferentialIntegrity => "referential_integrity",
            ApiError::BadRequest => "bad_request",
            ApiError::Unavailable => "transient",
            ApiError::Internal => "internal",
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Unauthorized => ApiError::Forbidden,
            RepoError::Conflict => ApiError::Conflict,
            RepoError::ReferentialIntegrity => ApiError::ReferentialIntegrity,
            RepoError::Transient(_) => ApiError::Unavailable,
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Repo(e) => e.into(),
            LifecycleError::Upload(_) => ApiError::Unavailable,
        }
    }
}

impl From<BoardError> for ApiError {
    fn from(e: BoardError) -> Self {
        match e {
            BoardError::Unauthenticated => ApiError::Unauthenticated,
            BoardError::Store(e) => e.into(),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;
        let status = match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict | ApiError::ReferentialIntegrity => StatusCode::CONFLICT,
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpResponse::build(status).json(ApiErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        })
    }
}
