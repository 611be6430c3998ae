use crate::model::{
    Id, ModelValidationError, book::BookMarker, room::RoomMarker, user::UserMarker,
    validate_content,
};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

pub const THREAD_CONTENT_MAX_LEN: usize = 5000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ThreadMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Thread {
    pub id: Id<ThreadMarker>,
    pub author_id: Id<UserMarker>,
    pub room_id: Id<RoomMarker>,
    pub content: String,
    pub created_at: UtcDateTime,
    pub book_id: Option<Id<BookMarker>>,
    pub spoiler: bool,
    pub mature: bool,
    pub comment_count: u32,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CreateThread {
    pub room_id: Id<RoomMarker>,
    pub content: String,
    #[serde(default)]
    pub book_id: Option<Id<BookMarker>>,
    #[serde(default)]
    pub spoiler: bool,
    #[serde(default)]
    pub mature: bool,
}

impl CreateThread {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_content(&self.content, THREAD_CONTENT_MAX_LEN)
    }
}
