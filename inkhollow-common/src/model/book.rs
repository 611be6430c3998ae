use crate::model::Id;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct BookMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Book {
    pub id: Id<BookMarker>,
    pub title: String,
    pub author_name: String,
    pub series: Option<SeriesEntry>,
    /// Whether the viewer keeps this book on their to-be-read list.
    pub in_tbr: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct SeriesEntry {
    pub name: String,
    pub position: u16,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Series position must be between 1 and {max}, got {0}", max = u16::MAX)]
pub struct InvalidSeriesPositionError(pub i64);

impl SeriesEntry {
    /// Series positions are one-based.
    pub fn new(name: String, position: i64) -> Result<Self, InvalidSeriesPositionError> {
        let position = u16::try_from(position)
            .ok()
            .filter(|position| *position > 0)
            .ok_or(InvalidSeriesPositionError(position))?;

        Ok(Self { name, position })
    }
}
