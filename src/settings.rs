//! Persistent render settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::{ParamFlags, UnitContext};
use crate::util::Result;

/// Render defaults that persist between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Sampling
    pub spp: u32,
    pub seed: u64,

    // Updates between contexts
    pub update_flags: ParamFlags,

    // Render one wrapper per context on the rayon pool
    pub parallel: bool,

    // Kernel length unit
    pub length_unit: String,

    // Sensors to render (all when unset)
    pub sensors: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            spp: 32,
            seed: 0,
            update_flags: ParamFlags::ALL,
            parallel: false,
            length_unit: "m".to_string(),
            sensors: None,
        }
    }
}

impl Settings {
    /// Default settings file, `<config dir>/kdict/settings.json`.
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("kdict");
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the default file, falling back to defaults
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Load settings from a file
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&json)?;
        if settings.spp == 0 {
            settings.spp = Self::default().spp;
        }
        Ok(settings)
    }

    /// Save settings to the default file
    pub fn save(&self) -> Result<()> {
        match Self::path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    /// Save settings to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Unit context for the configured length unit
    pub fn unit_context(&self) -> UnitContext {
        UnitContext::new(self.length_unit.as_str())
    }
}
