use inkhollow_common::model::{
    Id, ModelValidationError,
    book::{Book, SeriesEntry},
    count_from_db,
    recommendation::RecommendationRequest,
    room::Room,
    thread::Thread,
    user::{DisplayName, User},
};
use sqlx::FromRow;
use time::PrimitiveDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub display_name: String,
    pub race: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct RoomRecord {
    pub room_snowflake: i64,
    pub name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct ThreadRecord {
    pub thread_snowflake: i64,
    pub user_snowflake: i64,
    pub room_snowflake: i64,
    pub content: String,
    pub created_at: PrimitiveDateTime,
    pub book_snowflake: Option<i64>,
    pub spoiler: bool,
    pub mature: bool,
    pub comment_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct BookRecord {
    pub book_snowflake: i64,
    pub title: String,
    pub author_name: String,
    pub series_name: Option<String>,
    pub series_position: Option<i32>,
    pub in_tbr: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct RecommendationRequestRecord {
    pub request_snowflake: i64,
    pub user_snowflake: i64,
    pub content: String,
    pub created_at: PrimitiveDateTime,
    pub response_count: i64,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            display_name: DisplayName::new(value.display_name)?,
            race: value.race.parse()?,
        })
    }
}

impl From<RoomRecord> for Room {
    fn from(value: RoomRecord) -> Self {
        Self {
            id: Id::from_db(value.room_snowflake),
            name: value.name,
        }
    }
}

impl TryFrom<ThreadRecord> for Thread {
    type Error = ModelValidationError;

    fn try_from(value: ThreadRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.thread_snowflake),
            author_id: Id::from_db(value.user_snowflake),
            room_id: Id::from_db(value.room_snowflake),
            content: value.content,
            created_at: value.created_at.as_utc(),
            book_id: value.book_snowflake.map(Id::from_db),
            spoiler: value.spoiler,
            mature: value.mature,
            comment_count: count_from_db(value.comment_count)?,
        })
    }
}

impl TryFrom<BookRecord> for Book {
    type Error = ModelValidationError;

    fn try_from(value: BookRecord) -> Result<Self, Self::Error> {
        let series = match (value.series_name, value.series_position) {
            (Some(name), Some(position)) => Some(SeriesEntry::new(name, position.into())?),
            _ => None,
        };

        Ok(Self {
            id: Id::from_db(value.book_snowflake),
            title: value.title,
            author_name: value.author_name,
            series,
            in_tbr: value.in_tbr,
        })
    }
}

impl TryFrom<RecommendationRequestRecord> for RecommendationRequest {
    type Error = ModelValidationError;

    fn try_from(value: RecommendationRequestRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.request_snowflake),
            author_id: Id::from_db(value.user_snowflake),
            content: value.content,
            created_at: value.created_at.as_utc(),
            response_count: count_from_db(value.response_count)?,
        })
    }
}
