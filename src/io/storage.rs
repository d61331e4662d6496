use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

pub(crate) const APP_DIR: &str = "saavy_poly";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub selected_midi_input_id: Option<String>,
}

/// Remembers the last selected MIDI input across sessions.
#[derive(Debug, Clone)]
pub struct DeviceStore {
    path: PathBuf,
}

impl DeviceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform config directory.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| SynthError::Storage("could not determine config directory".into()))?;
        Ok(Self::new(dir.join(APP_DIR).join(SETTINGS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The remembered device id. A missing or unreadable file yields `None`.
    pub fn selected_input(&self) -> Option<String> {
        if !self.path.exists() {
            return None;
        }
        match self.read() {
            Ok(settings) => settings.selected_midi_input_id,
            Err(err) => {
                log::warn!("ignoring settings at {}: {err}", self.path.display());
                None
            }
        }
    }

    pub fn set_selected_input(&self, id: &str) -> Result<()> {
        let mut settings = if self.path.exists() {
            self.read().unwrap_or_default()
        } else {
            Settings::default()
        };
        settings.selected_midi_input_id = Some(id.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&settings)?)?;
        log::debug!("remembered MIDI input {id}");
        Ok(())
    }

    fn read(&self) -> Result<Settings> {
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
