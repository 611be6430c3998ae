use crate::server::{Result, ServerError, ServerRouter, extract::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkhollow_common::model::{
    Id,
    user::{CreateUser, User, UserMarker},
};
use inkhollow_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_user)
        .typed_post(create_user)
        .typed_put(follow_user)
        .typed_delete(unfollow_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users", rejection(ServerError))]
struct CreateUserPath();

async fn create_user(
    _: CreateUserPath,
    State(db): State<Arc<DbClient>>,
    Json(user): Json<CreateUser>,
) -> Result<Json<User>> {
    let user = db.create_user(&user).await?;

    Ok(Json(user))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct FollowChange {
    following: bool,
    changed: bool,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/following/{target}", rejection(ServerError))]
struct FollowingPath {
    id: Id<UserMarker>,
    target: Id<UserMarker>,
}

async fn ensure_users_exist(db: &DbClient, ids: [Id<UserMarker>; 2]) -> Result<()> {
    for id in ids {
        db.fetch_user(id)
            .await?
            .ok_or(ServerError::UserByIdNotFound(id))?;
    }
    Ok(())
}

async fn follow_user(
    FollowingPath { id, target }: FollowingPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<FollowChange>> {
    if id == target {
        return Err(ServerError::SelfFollow(id));
    }
    ensure_users_exist(&db, [id, target]).await?;

    let changed = db.follow_user(id, target).await?;

    Ok(Json(FollowChange {
        following: true,
        changed,
    }))
}

async fn unfollow_user(
    FollowingPath { id, target }: FollowingPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<FollowChange>> {
    ensure_users_exist(&db, [id, target]).await?;

    let changed = db.unfollow_user(id, target).await?;

    Ok(Json(FollowChange {
        following: false,
        changed,
    }))
}
