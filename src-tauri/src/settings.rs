use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
}

fn settings_path() -> PathBuf {
    env::temp_dir().join("mirror-space").join("settings.json")
}

impl Settings {
    /// Loads persisted settings, falling back to defaults on any failure.
    pub fn load() -> Self {
        let path = settings_path();
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring malformed settings at {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = settings_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("could not create {}", dir.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents)
            .with_context(|| format!("could not write {}", path.display()))?;
        Ok(())
    }

    /// The key to use at startup: persisted settings first, then the
    /// GEMINI_API_KEY environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.gemini_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()))
    }
}
