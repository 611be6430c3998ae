use crate::model::{Id, ModelValidationError, user::UserMarker, validate_content};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

pub const REQUEST_CONTENT_MAX_LEN: usize = 1000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct RecommendationRequestMarker;

/// An open call for book suggestions.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct RecommendationRequest {
    pub id: Id<RecommendationRequestMarker>,
    pub author_id: Id<UserMarker>,
    pub content: String,
    pub created_at: UtcDateTime,
    pub response_count: u32,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CreateRecommendationRequest {
    pub content: String,
}

impl CreateRecommendationRequest {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_content(&self.content, REQUEST_CONTENT_MAX_LEN)
    }
}
