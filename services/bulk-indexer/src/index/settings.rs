use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::client::{IndexSettings, REFRESH_DISABLED, SETTING_NUMBER_OF_REPLICAS, SETTING_REFRESH_INTERVAL};
use crate::error::{BulkError, Result};

const SETTINGS_FILE: &str = "settings.json";

/// Dynamic index settings, persisted next to the index files when the
/// index lives on disk.
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: RwLock<IndexSettings>,
}

impl SettingsStore {
    pub fn in_memory(defaults: IndexSettings) -> Result<Self> {
        validate(&defaults)?;
        Ok(Self {
            path: None,
            values: RwLock::new(defaults),
        })
    }

    /// Loads the persisted settings of the index in `dir`, or writes
    /// `defaults` there if none exist yet.
    pub fn load_or_init<P: AsRef<Path>>(dir: P, defaults: IndexSettings) -> Result<Self> {
        let path = dir.as_ref().join(SETTINGS_FILE);
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let stored: IndexSettings = serde_json::from_str(&content)?;
            validate(&stored)?;
            stored
        } else {
            validate(&defaults)?;
            write_settings(&path, &defaults)?;
            defaults
        };

        Ok(Self {
            path: Some(path),
            values: RwLock::new(values),
        })
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.read().get(name).cloned()
    }

    pub fn snapshot(&self) -> IndexSettings {
        self.read().clone()
    }

    /// Applies every entry or none of them.
    pub fn update(&self, changes: &IndexSettings) -> Result<()> {
        validate(changes)?;
        let mut values = match self.values.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut updated = values.clone();
        updated.extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(path) = &self.path {
            write_settings(path, &updated)?;
        }
        *values = updated;
        Ok(())
    }

    pub fn refresh_enabled(&self) -> bool {
        self.get(SETTING_REFRESH_INTERVAL).as_deref() != Some(REFRESH_DISABLED)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexSettings> {
        match self.values.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub fn validate(settings: &IndexSettings) -> Result<()> {
    for (name, value) in settings {
        let valid = match name.as_str() {
            SETTING_NUMBER_OF_REPLICAS => value.parse::<u32>().is_ok(),
            SETTING_REFRESH_INTERVAL => value == REFRESH_DISABLED || is_time_value(value),
            _ => false,
        };
        if !valid {
            return Err(BulkError::InvalidSetting {
                name: name.clone(),
                value: value.clone(),
            });
        }
    }
    Ok(())
}

fn is_time_value(value: &str) -> bool {
    let split = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    !digits.is_empty() && matches!(unit, "ms" | "s" | "m" | "h" | "d")
}

fn write_settings(path: &Path, settings: &IndexSettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)?;
    fs::write(path, content)?;
    Ok(())
}
