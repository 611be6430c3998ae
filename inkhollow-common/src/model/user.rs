use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

pub const DISPLAY_NAME_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub display_name: DisplayName,
    pub race: Race,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CreateUser {
    pub display_name: DisplayName,
    pub race: Race,
}

/// The faction a reader picked during onboarding.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Race {
    #[default]
    Human,
    Elf,
    Dwarf,
    Orc,
    Halfling,
    Fae,
    Undead,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown race: {0}")]
pub struct UnknownRaceError(String);

impl Race {
    pub const ALL: [Race; 7] = [
        Race::Human,
        Race::Elf,
        Race::Dwarf,
        Race::Orc,
        Race::Halfling,
        Race::Fae,
        Race::Undead,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Race::Human => "human",
            Race::Elf => "elf",
            Race::Dwarf => "dwarf",
            Race::Orc => "orc",
            Race::Halfling => "halfling",
            Race::Fae => "fae",
            Race::Undead => "undead",
        }
    }
}

impl Display for Race {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Race {
    type Err = UnknownRaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Race::ALL
            .into_iter()
            .find(|race| race.as_str() == s)
            .ok_or_else(|| UnknownRaceError(s.to_owned()))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct DisplayName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The display name is invalid: {0:?}")]
pub struct InvalidDisplayNameError(String);

impl DisplayName {
    /// Names must contain something besides whitespace and stay within
    /// [`DISPLAY_NAME_MAX_LEN`] characters.
    pub fn new(name: String) -> Result<Self, InvalidDisplayNameError> {
        if !name.trim().is_empty() && name.chars().count() <= DISPLAY_NAME_MAX_LEN {
            Ok(DisplayName(name))
        } else {
            Err(InvalidDisplayNameError(name))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for DisplayName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        DisplayName::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"DisplayName"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{DISPLAY_NAME_MAX_LEN, DisplayName, Race};

    #[test]
    fn display_name_bounds() {
        assert!(DisplayName::new("Elowen Thistledown".to_owned()).is_ok());
        assert!(DisplayName::new("ä".repeat(DISPLAY_NAME_MAX_LEN)).is_ok());
        assert!(DisplayName::new("a".repeat(DISPLAY_NAME_MAX_LEN + 1)).is_err());
        assert!(DisplayName::new("   ".to_owned()).is_err());
        assert!(DisplayName::new(String::new()).is_err());
    }

    #[test]
    fn display_name_deserialization_validates() {
        assert!(serde_json::from_str::<DisplayName>("\"Brannoc\"").is_ok());
        assert!(serde_json::from_str::<DisplayName>("\"\"").is_err());
    }

    #[test]
    fn race_names_round_trip() {
        for race in Race::ALL {
            assert_eq!(race.as_str().parse::<Race>(), Ok(race));
            assert_eq!(
                serde_json::to_string(&race).unwrap(),
                format!("\"{race}\"")
            );
        }
        assert!("dragon".parse::<Race>().is_err());
    }
}
