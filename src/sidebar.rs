use std::{fs, path::Path};

use anyhow::Context as _;
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const SIDEBAR_FILE: &str = "sidebar.json";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub title: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MenuItem>>,
}

/// Navigation loaded from `sidebar.json`. Older files call the list `items`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct SidebarConfig {
    #[serde(default, alias = "items")]
    pub menu: Vec<MenuItem>,
}

impl SidebarConfig {
    /// Missing or unreadable files give an empty menu.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => {
                info!("no sidebar at {}, using an empty menu", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(sidebar) => sidebar,
            Err(e) => {
                warn!("ignoring invalid {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Like [`SidebarConfig::load`], but a broken file is an error instead of
    /// being silently replaced.
    pub fn load_strict(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n").with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn push(&mut self, item: MenuItem) {
        self.menu.push(item);
    }
}
