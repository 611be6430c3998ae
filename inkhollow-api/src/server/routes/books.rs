use crate::server::{
    Result, ServerError, ServerRouter,
    extract::{Json, Query},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkhollow_common::{
    model::{Id, book::Book, user::UserMarker},
    search::{SearchQuery, search_books},
};
use inkhollow_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_books)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/books", rejection(ServerError))]
struct GetBooksPath {
    id: Id<UserMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct BooksQuery {
    #[serde(default)]
    q: String,
}

/// Books as seen by user `id`, optionally narrowed by a search query.
async fn get_books(
    GetBooksPath { id }: GetBooksPath,
    State(db): State<Arc<DbClient>>,
    Query(BooksQuery { q }): Query<BooksQuery>,
) -> Result<Json<Vec<Book>>> {
    db.fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    let books = db.fetch_books(id).await?;
    let query = SearchQuery::new(&q);

    let matches = search_books(&books, &query).into_iter().cloned().collect();

    Ok(Json(matches))
}
