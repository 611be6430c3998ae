pub mod book;
pub mod recommendation;
pub mod room;
pub mod thread;
pub mod user;

use crate::{
    model::{
        book::InvalidSeriesPositionError,
        user::{InvalidDisplayNameError, UnknownRaceError},
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    DisplayName(#[from] InvalidDisplayNameError),
    #[error(transparent)]
    Race(#[from] UnknownRaceError),
    #[error(transparent)]
    SeriesPosition(#[from] InvalidSeriesPositionError),
    #[error("Counter value out of range: {0}")]
    CountOutOfRange(i64),
    #[error("Content must not be blank")]
    BlankContent,
    #[error("Content is {len} characters long, at most {max} are allowed")]
    ContentTooLong { len: usize, max: usize },
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct InkhollowEpoch;
impl Epoch for InkhollowEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type InkhollowSnowflake = Snowflake<InkhollowEpoch>;
pub type InkhollowSnowflakeGenerator = SnowflakeGenerator<InkhollowEpoch>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(InkhollowSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: InkhollowSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> InkhollowSnowflake {
        self.0
    }

    /// Postgres has no unsigned integers, so ids are stored bit-cast into `BIGINT`.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<InkhollowSnowflake> for Id<Marker> {
    fn from(value: InkhollowSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for InkhollowSnowflake {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(InkhollowSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

/// Checks user-written text of threads and requests.
pub fn validate_content(content: &str, max: usize) -> Result<(), ModelValidationError> {
    if content.trim().is_empty() {
        return Err(ModelValidationError::BlankContent);
    }

    let len = content.chars().count();
    if len > max {
        return Err(ModelValidationError::ContentTooLong { len, max });
    }
    Ok(())
}

/// Converts a stored counter column into a count, rejecting values that do not fit.
pub fn count_from_db(value: i64) -> Result<u32, ModelValidationError> {
    u32::try_from(value).map_err(|_| ModelValidationError::CountOutOfRange(value))
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id, ModelValidationError, count_from_db, user::UserMarker, validate_content,
    };

    #[test]
    fn db_representation_keeps_high_bit() {
        let id = Id::<UserMarker>::from(u64::MAX - 5);
        assert!(id.to_db() < 0);
        assert_eq!(Id::<UserMarker>::from_db(id.to_db()), id);
    }

    #[test]
    fn counts() {
        assert_eq!(count_from_db(12), Ok(12));
        assert_eq!(
            count_from_db(-1),
            Err(ModelValidationError::CountOutOfRange(-1))
        );
    }

    #[test]
    fn content_validation() {
        assert_eq!(validate_content("Any grimdark picks?", 30), Ok(()));
        assert_eq!(
            validate_content(" \n\t", 30),
            Err(ModelValidationError::BlankContent)
        );
        assert_eq!(
            validate_content("abcdef", 5),
            Err(ModelValidationError::ContentTooLong { len: 6, max: 5 })
        );
    }
}
