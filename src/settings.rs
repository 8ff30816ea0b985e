use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::focus::SignalWeights;
use crate::pace::PaceSettings;
use crate::schedule::{default_blocks, Schedule, TimeBlock};

pub const DEBUG_ENV: &str = "RFAI_DEBUG";
pub const DATA_DIR_ENV: &str = "RFAI_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub tick_interval_secs: u64,
    pub sample_interval_secs: u64,
    pub max_sample_age_secs: u64,
    pub capture_timeout_ms: u64,
    pub weights: SignalWeights,
    /// Opt-in capture devices. No capture backend ships yet, so pose, gaze
    /// and ambient audio stay unavailable either way.
    pub enable_camera: bool,
    pub enable_microphone: bool,
    pub auto_start_sessions: bool,
    pub schedule: Vec<TimeBlock>,
    pub pace: PaceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_secs: 15,
            sample_interval_secs: 5,
            max_sample_age_secs: 45,
            capture_timeout_ms: 1500,
            weights: SignalWeights::default(),
            enable_camera: false,
            enable_microphone: false,
            auto_start_sessions: false,
            schedule: default_blocks(),
            pace: PaceSettings::default(),
        }
    }
}

impl Settings {
    /// Classifier tick. In debug mode it drops to the sample interval.
    pub fn tick_interval(&self, debug: bool) -> Duration {
        let secs = if debug {
            self.sample_interval_secs
        } else {
            self.tick_interval_secs
        };
        Duration::from_secs(secs.max(1))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs.max(1))
    }

    pub fn max_sample_age(&self) -> Duration {
        Duration::from_secs(self.max_sample_age_secs)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn schedule(&self) -> Schedule {
        Schedule::new(self.schedule.clone())
    }

    /// Rejects values the classifier, session tracker or pace learner would
    /// assert on.
    pub fn validate(&self) -> Result<()> {
        self.weights.check().context("invalid signal weights")?;
        for block in &self.schedule {
            block.check().context("invalid schedule")?;
        }
        self.pace.check().context("invalid pace settings")?;
        Ok(())
    }
}

/// `RFAI_DEBUG=1|true`.
pub fn debug_mode() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// `RFAI_DATA_DIR`, else the platform data directory.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("rfai"))
        .context("could not determine a data directory; set RFAI_DATA_DIR")
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// Loads `path`; a missing, unparsable or invalid file yields defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) => match settings.validate() {
                    Ok(()) => settings,
                    Err(err) => {
                        log::warn!(
                            "Ignoring invalid settings at {}: {err:#}",
                            path.display()
                        );
                        Settings::default()
                    }
                },
                Err(err) => {
                    log::warn!(
                        "Ignoring unreadable settings at {}: {err}",
                        path.display()
                    );
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Settings {
        self.read().clone()
    }

    /// Validates, persists, then publishes. Rejected settings leave both the
    /// file and the in-memory copy untouched.
    pub fn update(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings at {}", self.path.display()))?;
        data.validate()?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), Settings::default());
        assert_eq!(store.get().schedule.len(), 3);
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.get();
        settings.tick_interval_secs = 30;
        settings.enable_camera = true;
        settings.pace.epsilon = 0.05;
        store.update(settings.clone()).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.get(), settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "autoStartSessions": true, "weights": { "pose": 0.5 } }"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert!(settings.auto_start_sessions);
        assert_eq!(settings.weights.pose, 0.5);
        assert_eq!(settings.weights.gaze, SignalWeights::default().gaze);
        assert_eq!(settings.tick_interval_secs, 15);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.get(), Settings::default());
        assert!(store.reload().is_err());
    }

    #[test]
    fn invalid_values_on_disk_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let weights = dir.path().join("weights.json");
        fs::write(&weights, r#"{ "weights": { "gaze": -0.2 } }"#).unwrap();
        assert_eq!(SettingsStore::new(weights).unwrap().get(), Settings::default());

        let schedule = dir.path().join("schedule.json");
        fs::write(
            &schedule,
            r#"{
                "autoStartSessions": true,
                "schedule": [{
                    "name": "Morning Physics",
                    "blockType": "science",
                    "start": "09:00",
                    "end": "10:00",
                    "goalMinutes": 30,
                    "attentionThreshold": 70
                }]
            }"#,
        )
        .unwrap();
        let store = SettingsStore::new(schedule).unwrap();
        assert_eq!(store.get(), Settings::default());
        assert!(store.reload().is_err());
    }

    #[test]
    fn update_rejects_invalid_settings_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.get();
        settings.weights.pose = f64::NAN;
        assert!(store.update(settings).is_err());

        let mut settings = store.get();
        settings.schedule[0].attention_threshold = 70.0;
        let err = store.update(settings).unwrap_err();
        assert!(format!("{err:#}").contains("attention threshold"));

        let mut settings = store.get();
        settings.pace.learning_rate = 0.0;
        assert!(store.update(settings).is_err());

        assert_eq!(store.get(), Settings::default());
        assert!(!path.exists());
    }

    #[test]
    fn debug_mode_shortens_the_tick() {
        let settings = Settings::default();
        assert_eq!(settings.tick_interval(false), Duration::from_secs(15));
        assert_eq!(settings.tick_interval(true), Duration::from_secs(5));
    }
}
