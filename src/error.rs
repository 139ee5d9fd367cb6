use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures of the graph store access layer. Raw driver errors never cross
/// this boundary without being wrapped.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("store operation failed: {0}")]
    Db(#[from] sea_orm::DbErr),
}

/// Closed taxonomy for external catalog failures, keyed by HTTP status.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("bad request")]
    BadRequest,
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("internal server error")]
    ServerError,
    #[error("response with status {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("no trailer data found")]
    NoTrailer,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Failures of the periodic cache-update job.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("transaction failed: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("{failed} of {total} user pages failed")]
    PagesFailed { failed: usize, total: usize },
    #[error("update job already running")]
    AlreadyRunning,
}

/// Business-rule failures of the group service.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("user is not a member of this group")]
    NotAMember,
    #[error("user has no linked catalog account")]
    MissingExternalLink,
    #[error("external watchlist update failed: {0}")]
    ExternalSyncFailed(#[source] CatalogError),
    #[error("unsupported vote value '{0}'")]
    InvalidVote(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("transaction failed: {0}")]
    Db(#[from] sea_orm::DbErr),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Store(StoreError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, format!("{what} not found"))
            }
            AppError::Group(GroupError::NotAMember) => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            AppError::Group(GroupError::InvalidVote(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Group(GroupError::MissingExternalLink) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::Group(GroupError::Store(StoreError::NotFound(what))) => {
                (StatusCode::NOT_FOUND, format!("{what} not found"))
            }
            AppError::Sync(SyncError::AlreadyRunning) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            _ => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
