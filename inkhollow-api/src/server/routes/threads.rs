use crate::server::{
    FeedSettings, Result, ServerError, ServerRouter,
    extract::{Json, Query},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkhollow_common::{
    model::{
        Id,
        thread::{CreateThread, Thread, ThreadMarker},
        user::UserMarker,
    },
    search::{SearchQuery, search_threads},
};
use inkhollow_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_thread)
        .typed_get(search_recent_threads)
        .typed_post(create_thread)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/threads/{id}", rejection(ServerError))]
struct GetThreadPath {
    id: Id<ThreadMarker>,
}

async fn get_thread(
    GetThreadPath { id }: GetThreadPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Thread>> {
    let thread = db
        .fetch_thread(id)
        .await?
        .ok_or(ServerError::ThreadByIdNotFound(id))?;

    Ok(Json(thread))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/threads", rejection(ServerError))]
struct SearchThreadsPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct ThreadsQuery {
    #[serde(default)]
    q: String,
}

/// The most recent threads across all rooms whose content matches `q`.
async fn search_recent_threads(
    _: SearchThreadsPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<FeedSettings>,
    Query(ThreadsQuery { q }): Query<ThreadsQuery>,
) -> Result<Json<Vec<Thread>>> {
    let threads = db
        .fetch_recent_threads(None, settings.content_limit)
        .await?;
    let query = SearchQuery::new(&q);

    let matches = search_threads(&threads, &query)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(matches))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/threads", rejection(ServerError))]
struct CreateThreadPath {
    id: Id<UserMarker>,
}

async fn create_thread(
    CreateThreadPath { id }: CreateThreadPath,
    State(db): State<Arc<DbClient>>,
    Json(thread): Json<CreateThread>,
) -> Result<Json<Thread>> {
    thread.validate()?;
    db.fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    let thread = db.create_thread(id, &thread).await?;

    Ok(Json(thread))
}
