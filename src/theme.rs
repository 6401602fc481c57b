//! Site themes.
//!
//! A theme is a colour scheme plus optional static assets. Project themes
//! live in `themes/<name>/theme.toml`; `light`, `dark` and `system` are
//! built in.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context as _, Result};
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::CONFIG_FILE;

pub const BUILTIN_THEMES: [&str; 3] = ["light", "dark", "system"];
pub const STYLESHEET: &str = "assets/css/theme.css";

lazy_static! {
    static ref HEX_COLOR: Regex = Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeColors {
    pub primary: String,
    pub background: String,
    pub text: String,
}

impl ThemeColors {
    pub fn new(primary: &str, background: &str, text: &str) -> Result<Self> {
        for (role, color) in [("primary", primary), ("background", background), ("text", text)] {
            if !HEX_COLOR.is_match(color) {
                bail!("{role} colour {color:?} must look like #rgb or #rrggbb");
            }
        }

        Ok(Self {
            primary: primary.to_string(),
            background: background.to_string(),
            text: text.to_string(),
        })
    }

    fn light() -> Self {
        Self {
            primary: "#3498db".into(),
            background: "#ffffff".into(),
            text: "#333333".into(),
        }
    }

    fn dark() -> Self {
        Self {
            primary: "#61afef".into(),
            background: "#1e1e1e".into(),
            text: "#e0e0e0".into(),
        }
    }

    fn css_variables(&self) -> String {
        format!(
            "--primary-color: {}; --bg-color: {}; --text-color: {};",
            self.primary, self.background, self.text
        )
    }
}

/// Raw theme.toml structure for deserialization
#[derive(Debug, Deserialize, Serialize)]
struct ThemeToml {
    theme: ThemeMeta,
}

#[derive(Debug, Deserialize, Serialize)]
struct ThemeMeta {
    name: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    description: String,
    colors: ThemeColors,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub name: String,
    pub version: String,
    pub description: String,
    pub colors: ThemeColors,
    /// Directory of a project theme; `None` for built-ins.
    pub path: Option<PathBuf>,
    /// `system` follows the reader's colour-scheme preference.
    follows_system: bool,
}

impl Theme {
    pub fn builtin(name: &str) -> Option<Self> {
        let (colors, description, follows_system) = match name {
            "light" => (ThemeColors::light(), "Light colours", false),
            "dark" => (ThemeColors::dark(), "Dark colours", false),
            "system" => (ThemeColors::light(), "Follows the reader's preference", true),
            _ => return None,
        };

        Some(Self {
            name: name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: description.to_string(),
            colors,
            path: None,
            follows_system,
        })
    }

    /// Load a theme from a directory containing theme.toml
    pub fn from_path(path: &Path) -> Result<Self> {
        let theme_toml_path = path.join("theme.toml");
        let content = fs::read_to_string(&theme_toml_path)
            .with_context(|| format!("failed to read {}", theme_toml_path.display()))?;
        let toml: ThemeToml = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", theme_toml_path.display()))?;

        let meta = toml.theme;
        Ok(Self {
            name: meta.name,
            version: meta.version,
            description: meta.description,
            colors: meta.colors,
            path: Some(path.to_path_buf()),
            follows_system: false,
        })
    }

    pub fn assets_dir(&self) -> Option<PathBuf> {
        self.path
            .as_ref()
            .map(|p| p.join("assets"))
            .filter(|p| p.is_dir())
    }

    /// Whether the theme ships its own stylesheet instead of a generated one.
    pub fn has_stylesheet(&self) -> bool {
        self.path
            .as_ref()
            .is_some_and(|p| p.join(STYLESHEET).is_file())
    }

    pub fn stylesheet(&self) -> String {
        let mut css = format!(
            "/* {} theme */\n:root {{ {} }}\nbody {{ color: var(--text-color); background: var(--bg-color); }}\na {{ color: var(--primary-color); }}\n",
            self.name,
            self.colors.css_variables()
        );

        if self.follows_system {
            css.push_str(&format!(
                "@media (prefers-color-scheme: dark) {{ :root {{ {} }} }}\n",
                ThemeColors::dark().css_variables()
            ));
        }

        css
    }
}

pub struct ThemeManager {
    project_dir: PathBuf,
    themes_dir: PathBuf,
}

impl ThemeManager {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            themes_dir: project_dir.join("themes"),
        }
    }

    /// Built-ins first, then project themes sorted by directory name.
    pub fn discover(&self) -> Result<Vec<Theme>> {
        let mut themes: Vec<Theme> = BUILTIN_THEMES
            .iter()
            .filter_map(|name| Theme::builtin(name))
            .collect();

        if !self.themes_dir.is_dir() {
            return Ok(themes);
        }

        let mut dirs = fs::read_dir(&self.themes_dir)
            .with_context(|| format!("failed to read {}", self.themes_dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.join("theme.toml").is_file())
            .collect::<Vec<_>>();
        dirs.sort();

        for dir in dirs {
            match Theme::from_path(&dir) {
                Ok(theme) => themes.push(theme),
                Err(e) => warn!("skipping theme at {}: {:#}", dir.display(), e),
            }
        }

        Ok(themes)
    }

    /// Project themes shadow built-ins of the same name.
    pub fn get(&self, name: &str) -> Result<Theme> {
        let dir = self.themes_dir.join(name);
        if dir.join("theme.toml").is_file() {
            return Theme::from_path(&dir);
        }

        Theme::builtin(name).ok_or_else(|| anyhow!("theme {name:?} not found"))
    }

    pub fn create(&self, name: &str, colors: ThemeColors) -> Result<Theme> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("invalid theme name {name:?}");
        }

        let dir = self.themes_dir.join(name);
        if dir.exists() {
            bail!("theme {name:?} already exists at {}", dir.display());
        }

        fs::create_dir_all(dir.join("assets").join("css"))
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let meta = ThemeToml {
            theme: ThemeMeta {
                name: name.to_string(),
                version: "1.0.0".to_string(),
                description: format!("Custom theme {name}"),
                colors,
            },
        };
        fs::write(dir.join("theme.toml"), toml::to_string_pretty(&meta)?)?;

        let theme = Theme::from_path(&dir)?;
        fs::write(dir.join(STYLESHEET), theme.stylesheet())?;

        info!("created theme {} in {}", name, dir.display());
        Ok(theme)
    }

    /// Records `name` as the active theme in `readme.toml`.
    pub fn activate(&self, name: &str) -> Result<Theme> {
        let theme = self.get(name)?;

        let config_file = self.project_dir.join(CONFIG_FILE);
        let mut table = if config_file.is_file() {
            let text = fs::read_to_string(&config_file)
                .with_context(|| format!("failed to read {}", config_file.display()))?;
            text.parse::<toml::Table>()
                .with_context(|| format!("failed to parse {}", config_file.display()))?
        } else {
            toml::Table::new()
        };

        table.insert("theme".to_string(), toml::Value::String(name.to_string()));
        fs::write(&config_file, toml::to_string_pretty(&table)?)
            .with_context(|| format!("failed to write {}", config_file.display()))?;

        info!("switched to theme {name}");
        Ok(theme)
    }
}
