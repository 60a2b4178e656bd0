use crate::models::Settings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;
use std::sync::{Mutex, PoisonError};

mod instance;

pub use instance::{InstanceLock, LOCK_FILE};

/// Primary settings file, written on every save
pub const SETTINGS_FILE: &str = "pomotray.yaml";

/// Flat JSON record left behind by the original tray program
pub const LEGACY_SETTINGS_FILE: &str = "pomodoro_settings.json";

/// Prefix for environment overrides, e.g. `POMOTRAY_WORK_MINUTES=50`
pub const ENV_PREFIX: &str = "POMOTRAY";

/// Load and persist the settings snapshot.
///
/// The controller only depends on this trait, so hosts can keep settings
/// wherever they like.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsRepository: Send + Sync {
    /// Load settings; a missing store yields defaults
    fn load(&self) -> Result<Settings>;

    /// Persist a validated snapshot
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Settings as found on disk or in the environment, before range checks.
///
/// Minutes are read as signed integers so a negative or oversized value
/// only resets its own field instead of failing the whole load.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    work_minutes: Option<i64>,
    short_break_minutes: Option<i64>,
    long_break_minutes: Option<i64>,
    sound_enabled: Option<bool>,
}

impl RawSettings {
    /// Missing fields take defaults; values outside `u32` become 0, which
    /// every minutes range rejects
    fn resolve(self) -> Settings {
        let defaults = Settings::default();
        let minutes = |value: Option<i64>, default: u32| {
            value.map_or(default, |v| u32::try_from(v).unwrap_or(0))
        };

        Settings {
            work_minutes: minutes(self.work_minutes, defaults.work_minutes),
            short_break_minutes: minutes(self.short_break_minutes, defaults.short_break_minutes),
            long_break_minutes: minutes(self.long_break_minutes, defaults.long_break_minutes),
            sound_enabled: self.sound_enabled.unwrap_or(defaults.sound_enabled),
        }
    }
}

/// Settings as the original program stored them
#[derive(Debug, Deserialize)]
struct LegacySettings {
    pomodoro_duration: i64,
    short_break_duration: i64,
    long_break_duration: i64,
    enable_clock_sound: i64,
}

impl From<LegacySettings> for RawSettings {
    fn from(legacy: LegacySettings) -> Self {
        Self {
            work_minutes: Some(legacy.pomodoro_duration),
            short_break_minutes: Some(legacy.short_break_duration),
            long_break_minutes: Some(legacy.long_break_duration),
            sound_enabled: Some(legacy.enable_clock_sound != 0),
        }
    }
}

/// Directory-backed settings store.
///
/// Load order:
/// 1. `pomotray.yaml`
/// 2. `pomodoro_settings.json` (legacy) if no YAML file exists yet
/// 3. Defaults
///
/// `POMOTRAY_*` environment overrides apply on top of whichever source was
/// used. Out-of-range fields are reset to their defaults one by one.
///
/// Saving always writes `pomotray.yaml`, so a legacy record is migrated on
/// the first save.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    settings_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    legacy_path: Utf8PathBuf,
    env_source: Option<config::Map<String, String>>,
}

impl SettingsStore {
    /// Create a store rooted at `settings_dir` (e.g. "Pomotray Data"), creating the directory if needed
    pub fn new<P: AsRef<Utf8Path>>(settings_dir: P) -> Result<Self> {
        let settings_dir = settings_dir.as_ref().to_path_buf();

        if !settings_dir.exists() {
            fs::create_dir_all(&settings_dir).with_context(|| {
                format!("Failed to create settings directory: {}", settings_dir)
            })?;
        }

        Ok(Self {
            settings_path: settings_dir.join(SETTINGS_FILE),
            legacy_path: settings_dir.join(LEGACY_SETTINGS_FILE),
            settings_dir,
            env_source: None,
        })
    }

    /// Read overrides from `vars` instead of the process environment
    pub fn with_env_source(mut self, vars: config::Map<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    pub fn settings_dir(&self) -> &Utf8Path {
        &self.settings_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    pub fn legacy_path(&self) -> &Utf8Path {
        &self.legacy_path
    }

    fn environment(&self) -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(self.env_source.clone())
    }

    /// YAML file (if any) with environment overrides on top
    fn load_layered(&self) -> Result<RawSettings> {
        let layered = config::Config::builder()
            .add_source(
                config::File::with_name(self.settings_path.as_str())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(self.environment())
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))
    }

    /// Legacy record, or defaults if it cannot be parsed in full
    fn load_legacy(&self) -> RawSettings {
        let parsed = config::Config::builder()
            .add_source(
                config::File::with_name(self.legacy_path.as_str())
                    .format(config::FileFormat::Json),
            )
            .build()
            .and_then(|legacy| legacy.try_deserialize::<LegacySettings>());

        match parsed {
            Ok(legacy) => {
                tracing::info!("Using legacy settings file: {}", self.legacy_path);
                legacy.into()
            }
            Err(e) => {
                tracing::warn!(
                    "Legacy settings file {} is unreadable ({}), using defaults",
                    self.legacy_path,
                    e
                );
                RawSettings::default()
            }
        }
    }

    /// Apply environment overrides on top of an already loaded record
    fn override_from_env(&self, base: RawSettings) -> Result<RawSettings> {
        let mut builder = config::Config::builder();
        for (key, value) in [
            ("work_minutes", base.work_minutes),
            ("short_break_minutes", base.short_break_minutes),
            ("long_break_minutes", base.long_break_minutes),
        ] {
            if let Some(value) = value {
                builder = builder.set_default(key, value)?;
            }
        }
        if let Some(enabled) = base.sound_enabled {
            builder = builder.set_default("sound_enabled", enabled)?;
        }

        builder
            .add_source(self.environment())
            .build()
            .and_then(|layered| layered.try_deserialize::<RawSettings>())
            .context("Failed to apply environment overrides")
    }
}

impl SettingsRepository for SettingsStore {
    fn load(&self) -> Result<Settings> {
        let raw = if self.settings_path.exists() {
            let raw = self.load_layered()?;
            tracing::info!("Loaded settings from {}", self.settings_path);
            raw
        } else if self.legacy_path.exists() {
            self.override_from_env(self.load_legacy())?
        } else {
            tracing::warn!(
                "Settings file not found at {} or {}, using defaults",
                self.settings_path,
                self.legacy_path
            );
            // Environment overrides still apply on top of defaults
            self.load_layered()?
        };

        let (settings, replaced) = raw.resolve().sanitized();
        for field in replaced {
            tracing::warn!("Setting {} out of range, using default", field);
        }

        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }
}

/// In-memory repository for tests and embedding hosts
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    stored: Mutex<Option<Settings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            stored: Mutex::new(Some(settings)),
        }
    }

    /// Last saved snapshot, if any
    pub fn stored(&self) -> Option<Settings> {
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsRepository for MemorySettingsStore {
    fn load(&self) -> Result<Settings> {
        Ok(self.stored().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner) = Some(*settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, SettingsStore) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();
        let store = SettingsStore::new(dir)
            .unwrap()
            .with_env_source(config::Map::new());
        (temp_dir, store)
    }

    #[test]
    fn test_store_creation_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp_dir.path().join("Pomotray Data")).unwrap();

        let store = SettingsStore::new(&dir).unwrap();

        assert!(dir.exists());
        assert_eq!(store.settings_path(), dir.join(SETTINGS_FILE));
    }

    #[test]
    fn test_load_defaults_when_empty() {
        let (_temp_dir, store) = temp_store();
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_save_and_load_yaml() {
        let (_temp_dir, store) = temp_store();
        let settings = Settings {
            work_minutes: 50,
            short_break_minutes: 10,
            long_break_minutes: 30,
            sound_enabled: false,
        };

        store.save(&settings).unwrap();

        assert!(store.settings_path().exists());
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_legacy_json_is_read() {
        let (_temp_dir, store) = temp_store();
        fs::write(
            store.legacy_path(),
            r#"{"pomodoro_duration": 30, "short_break_duration": 7, "long_break_duration": 20, "enable_clock_sound": 0}"#,
        )
        .unwrap();

        let settings = store.load().unwrap();

        assert_eq!(settings.work_minutes, 30);
        assert_eq!(settings.short_break_minutes, 7);
        assert_eq!(settings.long_break_minutes, 20);
        assert!(!settings.sound_enabled);
    }

    #[test]
    fn test_garbage_legacy_json_falls_back_to_defaults() {
        let (_temp_dir, store) = temp_store();
        fs::write(store.legacy_path(), "not json at all").unwrap();

        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_out_of_range_fields_are_sanitized() {
        let (_temp_dir, store) = temp_store();
        fs::write(
            store.settings_path(),
            "work_minutes: 500\nshort_break_minutes: 3\nlong_break_minutes: 0\n",
        )
        .unwrap();

        let settings = store.load().unwrap();

        assert_eq!(settings.work_minutes, 25);
        assert_eq!(settings.short_break_minutes, 3);
        assert_eq!(settings.long_break_minutes, 15);
    }

    #[test]
    fn test_negative_minutes_reset_only_that_field() {
        let (_temp_dir, store) = temp_store();
        fs::write(
            store.settings_path(),
            "work_minutes: -5\nshort_break_minutes: 7\nlong_break_minutes: 99999999999\nsound_enabled: false\n",
        )
        .unwrap();

        let settings = store.load().unwrap();

        assert_eq!(settings.work_minutes, 25);
        assert_eq!(settings.short_break_minutes, 7);
        assert_eq!(settings.long_break_minutes, 15);
        assert!(!settings.sound_enabled);
    }

    #[test]
    fn test_negative_legacy_minutes_are_sanitized() {
        let (_temp_dir, store) = temp_store();
        fs::write(
            store.legacy_path(),
            r#"{"pomodoro_duration": -1, "short_break_duration": 9, "long_break_duration": 20, "enable_clock_sound": 1}"#,
        )
        .unwrap();

        let settings = store.load().unwrap();

        assert_eq!(settings.work_minutes, 25);
        assert_eq!(settings.short_break_minutes, 9);
        assert_eq!(settings.long_break_minutes, 20);
    }

    #[test]
    fn test_env_overrides_legacy_record() {
        let (_temp_dir, store) = temp_store();
        fs::write(
            store.legacy_path(),
            r#"{"pomodoro_duration": 30, "short_break_duration": 7, "long_break_duration": 20, "enable_clock_sound": 1}"#,
        )
        .unwrap();

        let mut vars = config::Map::new();
        vars.insert("POMOTRAY_LONG_BREAK_MINUTES".to_string(), "40".to_string());
        let store = store.with_env_source(vars);

        let settings = store.load().unwrap();
        assert_eq!(settings.work_minutes, 30);
        assert_eq!(settings.short_break_minutes, 7);
        assert_eq!(settings.long_break_minutes, 40);
        assert!(settings.sound_enabled);
    }

    #[test]
    fn test_env_overrides_file() {
        let (_temp_dir, store) = temp_store();
        store.save(&Settings::default()).unwrap();

        let mut vars = config::Map::new();
        vars.insert("POMOTRAY_WORK_MINUTES".to_string(), "45".to_string());
        vars.insert("POMOTRAY_SOUND_ENABLED".to_string(), "false".to_string());
        let store = store.with_env_source(vars);

        let settings = store.load().unwrap();
        assert_eq!(settings.work_minutes, 45);
        assert!(!settings.sound_enabled);
        assert_eq!(settings.short_break_minutes, 5);
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySettingsStore::new();
        assert_eq!(store.load().unwrap(), Settings::default());
        assert_eq!(store.stored(), None);

        let settings = Settings {
            work_minutes: 40,
            ..Settings::default()
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }
}
