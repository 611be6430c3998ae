use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use extract::Json;
use inkhollow_common::{
    feed::FeedError,
    model::{
        Id, ModelValidationError,
        thread::ThreadMarker,
        user::UserMarker,
    },
    util::PositiveDuration,
};
use inkhollow_db::client::{DbClient, DbError};
use serde::{Deserialize, Serialize};
use std::{num::NonZeroU32, sync::Arc};
use thiserror::Error;
use tracing::error;

mod extract;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub feed_settings: FeedSettings,
}

/// How feeds are assembled from the repository.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct FeedSettings {
    pub tbr_spacing: PositiveDuration,
    /// Upper bound on threads, requests and users loaded per feed.
    pub content_limit: NonZeroU32,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Submitted data was invalid: {0}")]
    InvalidInput(#[from] ModelValidationError),
    #[error("User {0} cannot follow themselves")]
    SelfFollow(Id<UserMarker>),
    #[error("Feed could not be composed: {0}")]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Thread with id {0} was not found.")]
    ThreadByIdNotFound(Id<ThreadMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::ThreadByIdNotFound(_)
            | ServerError::UserByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidInput(_)
            | ServerError::SelfFollow(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_) | ServerError::Feed(_) | ServerError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}
