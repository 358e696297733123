use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::coach::DEFAULT_MODEL_URL;

pub const API_BASE_ENV: &str = "PADDLEWISE_API_BASE";
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserSettings {
    /// Note-generation credential. Absent disables coaching notes.
    pub hf_api_key: Option<String>,
    pub api_base: String,
    pub coach_model_url: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            hf_api_key: None,
            api_base: DEFAULT_API_BASE.into(),
            coach_model_url: DEFAULT_MODEL_URL.into(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Loads `path`, falling back to defaults when the file is missing or
    /// unreadable as settings.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unreadable settings at {}: {}",
                    path.display(),
                    err
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// `<config dir>/paddlewise/settings.json`.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("No configuration directory on this platform")?;
        Ok(base.join("paddlewise").join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> UserSettings {
        self.read().clone()
    }

    /// Non-blank note-generation credential, if any.
    pub fn coach_credential(&self) -> Option<String> {
        self.read()
            .hf_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }

    pub fn set_coach_credential(&self, key: Option<String>) -> Result<()> {
        let mut guard = self.write();
        guard.hf_api_key = key.map(|key| key.trim().to_string()).filter(|key| !key.is_empty());
        self.persist(&guard)
    }

    /// Backend base address; the environment wins over the stored value.
    pub fn api_base(&self) -> String {
        std::env::var(API_BASE_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.read().api_base.clone())
    }

    pub fn coach_model_url(&self) -> String {
        self.read().coach_model_url.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
