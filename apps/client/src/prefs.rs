//! Local preferences: display name and last-chosen map style.
//!
//! Stored as a small JSON object under fixed keys so a restart skips the name
//! prompt.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::style::MapStyle;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(rename = "mapStyle", default, skip_serializing_if = "Option::is_none")]
    pub map_style: Option<MapStyle>,
}

/// File-backed preference store.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read stored preferences. A missing file means nothing stored yet.
    pub fn load(&self) -> Result<Preferences, ClientError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Preferences::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, prefs: &Preferences) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(prefs)?)?;
        tracing::debug!(path = %self.path.display(), "preferences saved");
        Ok(())
    }
}
