//! Viewer settings persisted on the device.
//!
//! Settings are loaded once when a [`SettingsStore`] is created and written
//! back whenever [`SettingsStore::update`] changes them. Nothing reads the file
//! behind the store's back.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not access settings file {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("Settings file {} is malformed: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    Welcome,
    ChooseRace,
    PickRooms,
    FollowReaders,
    Done,
}

impl OnboardingStep {
    /// The following step; [`OnboardingStep::Done`] stays done.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            OnboardingStep::Welcome => OnboardingStep::ChooseRace,
            OnboardingStep::ChooseRace => OnboardingStep::PickRooms,
            OnboardingStep::PickRooms => OnboardingStep::FollowReaders,
            OnboardingStep::FollowReaders | OnboardingStep::Done => OnboardingStep::Done,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub theme: ThemeMode,
    pub onboarding: OnboardingStep,
    /// Slugs of shop items (avatars, frames, banners) the viewer bought.
    pub purchased_items: BTreeSet<String>,
}

impl ViewerSettings {
    pub fn advance_onboarding(&mut self) -> OnboardingStep {
        self.onboarding = self.onboarding.next();
        self.onboarding
    }

    /// Returns `false` if the item was already owned.
    pub fn purchase(&mut self, item: &str) -> bool {
        self.purchased_items.insert(item.to_owned())
    }

    #[must_use]
    pub fn owns(&self, item: &str) -> bool {
        self.purchased_items.contains(item)
    }
}

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: ViewerSettings,
}

impl SettingsStore {
    /// Reads settings from `path`. A missing file yields the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();

        let settings = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| {
                SettingsError::Malformed {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings file, using defaults");
                ViewerSettings::default()
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };

        Ok(Self { path, settings })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    /// Applies `change` and persists the result if anything changed.
    ///
    /// If saving fails the change is rolled back, so the store never holds
    /// settings that are not on disk.
    pub fn update<T>(
        &mut self,
        change: impl FnOnce(&mut ViewerSettings) -> T,
    ) -> Result<T, SettingsError> {
        let before = self.settings.clone();
        let output = change(&mut self.settings);

        if self.settings != before
            && let Err(err) = self.save()
        {
            self.settings = before;
            return Err(err);
        }
        Ok(output)
    }

    /// Writes through a sibling temporary file so a crash never leaves a torn file.
    pub fn save(&self) -> Result<(), SettingsError> {
        let io_error = |source: io::Error| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(&self.settings).map_err(|source| {
            SettingsError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let temporary = self.path.with_extension("json.tmp");
        fs::write(&temporary, json).map_err(io_error)?;
        fs::rename(&temporary, &self.path).map_err(io_error)?;

        debug!(path = %self.path.display(), "Saved viewer settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::settings::{OnboardingStep, SettingsError, SettingsStore, ThemeMode};
    use std::fs;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("settings.json")).unwrap();

        assert_eq!(store.settings().theme, ThemeMode::System);
        assert_eq!(store.settings().onboarding, OnboardingStep::Welcome);
        assert!(store.settings().purchased_items.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn updates_are_saved_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut store = SettingsStore::load(&path).unwrap();
        store
            .update(|settings| settings.theme = ThemeMode::Dark)
            .unwrap();
        let bought = store
            .update(|settings| settings.purchase("avatar-wyvern"))
            .unwrap();
        assert!(bought);

        let reloaded = SettingsStore::load(&path).unwrap();
        assert_eq!(reloaded.settings(), store.settings());
        assert!(reloaded.settings().owns("avatar-wyvern"));
    }

    #[test]
    fn unchanged_settings_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::load(&path).unwrap();
        store.update(|settings| settings.owns("banner-moon")).unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn purchasing_twice_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::load(dir.path().join("settings.json")).unwrap();

        assert!(store.update(|s| s.purchase("frame-oak")).unwrap());
        assert!(!store.update(|s| s.purchase("frame-oak")).unwrap());
        assert_eq!(store.settings().purchased_items.len(), 1);
    }

    #[test]
    fn onboarding_only_moves_forward() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::load(dir.path().join("settings.json")).unwrap();

        for _ in 0..10 {
            store.update(|s| s.advance_onboarding()).unwrap();
        }
        assert_eq!(store.settings().onboarding, OnboardingStep::Done);
    }

    #[test]
    fn failed_save_rolls_back_the_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let temporary = dir.path().join("settings.json.tmp");
        fs::create_dir(&temporary).unwrap();

        let mut store = SettingsStore::load(&path).unwrap();
        let result = store.update(|settings| settings.theme = ThemeMode::Dark);

        assert!(matches!(result, Err(SettingsError::Io { .. })));
        assert_eq!(store.settings().theme, ThemeMode::System);
        assert!(!path.exists());

        fs::remove_dir(&temporary).unwrap();
        store
            .update(|settings| settings.theme = ThemeMode::Dark)
            .unwrap();
        assert_eq!(
            SettingsStore::load(&path).unwrap().settings().theme,
            ThemeMode::Dark
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            SettingsStore::load(&path),
            Err(SettingsError::Malformed { .. })
        ));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "theme": "light" }"#).unwrap();

        let store = SettingsStore::load(&path).unwrap();
        assert_eq!(store.settings().theme, ThemeMode::Light);
        assert_eq!(store.settings().onboarding, OnboardingStep::Welcome);
    }
}
