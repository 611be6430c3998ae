use crate::server::{Result, ServerError, ServerRouter, extract::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkhollow_common::model::{
    Id,
    recommendation::{CreateRecommendationRequest, RecommendationRequest},
    user::UserMarker,
};
use inkhollow_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(create_recommendation_request)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/recommendation-requests", rejection(ServerError))]
struct CreateRecommendationRequestPath {
    id: Id<UserMarker>,
}

async fn create_recommendation_request(
    CreateRecommendationRequestPath { id }: CreateRecommendationRequestPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<CreateRecommendationRequest>,
) -> Result<Json<RecommendationRequest>> {
    request.validate()?;
    db.fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    let request = db.create_recommendation_request(id, &request).await?;

    Ok(Json(request))
}
