use crate::server::{
    FeedSettings, Result, ServerError, ServerRouter,
    extract::{Json, Query},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkhollow_common::{
    feed::{FeedComposer, FeedFilter, FeedItem},
    model::{Id, user::UserMarker},
};
use inkhollow_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use time::UtcDateTime;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/feed", rejection(ServerError))]
struct GetFeedPath {
    id: Id<UserMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct FeedQuery {
    #[serde(default)]
    filter: FeedFilter,
}

/// Serves the composed feed as is; ordering is the composer's business.
async fn get_feed(
    GetFeedPath { id }: GetFeedPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<FeedSettings>,
    Query(FeedQuery { filter }): Query<FeedQuery>,
) -> Result<Json<Vec<FeedItem>>> {
    db.fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    let follow_set = db.fetch_follow_set(id).await?;
    let content = db.fetch_feed_content(id, settings.content_limit).await?;

    let items = FeedComposer::new(UtcDateTime::now())
        .with_tbr_spacing(settings.tbr_spacing)
        .compose(content.sources(), &follow_set, filter)?;

    info!(
        viewer = %id,
        %filter,
        following = follow_set.len(),
        items = items.len(),
        "Served feed"
    );
    Ok(Json(items))
}
