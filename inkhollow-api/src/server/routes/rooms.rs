use crate::server::{Result, ServerError, ServerRouter, extract::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkhollow_common::model::room::Room;
use inkhollow_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_rooms)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/rooms", rejection(ServerError))]
struct GetRoomsPath();

async fn get_rooms(
    _: GetRoomsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Room>>> {
    Ok(Json(db.fetch_rooms().await?))
}
