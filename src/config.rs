use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::warn;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::BuildError;

pub const CONFIG_FILE: &str = "readme.toml";

const DEFAULT_BASE_URL: &str = "http://localhost";
const DEFAULT_PORT: u16 = 3000;

/// SEO values every page starts from before its own frontmatter is applied.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SeoDefaults {
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub image_url: String,
    pub lang: String,
    pub og_locale: String,
}

impl Default for SeoDefaults {
    fn default() -> Self {
        Self {
            title: "My Documentation".to_string(),
            description: "Documentation for my project".to_string(),
            keywords: "documentation, guide, help".to_string(),
            image_url: "/assets/images/social-share.jpg".to_string(),
            lang: "en".to_string(),
            og_locale: "en_US".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GithubConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
}

/// On-disk shape of `readme.toml`. Every key is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Settings {
    base_url: Option<String>,
    port: Option<u16>,
    theme: Option<String>,
    static_files: Option<Vec<String>>,
    plugins: Vec<String>,
    seo: SeoDefaults,
    github: GithubConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub bundled_templates: PathBuf,
    pub base_url: Url,
    pub port: u16,
    pub theme: Option<String>,
    pub static_files: Vec<String>,
    pub plugins: Vec<String>,
    pub seo: SeoDefaults,
    pub github: GithubConfig,
}

impl Config {
    /// Loads `readme.toml` from the project and applies the process environment.
    pub fn load(project_dir: PathBuf) -> Result<Self, BuildError> {
        Self::load_with_env(project_dir, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(project_dir: PathBuf, env: F) -> Result<Self, BuildError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_file = project_dir.join(CONFIG_FILE);

        let settings: Settings = if config_file.is_file() {
            let config_text = fs::read_to_string(&config_file)
                .map_err(|e| BuildError::io(&config_file, e))?;
            toml::from_str(&config_text).map_err(|e| {
                BuildError::configuration(format!("invalid {}: {}", config_file.display(), e))
            })?
        } else {
            Settings::default()
        };

        let base_url = env("BASE_URL")
            .or(settings.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::from_str(&base_url)
            .map_err(|e| BuildError::configuration(format!("invalid base url {base_url:?}: {e}")))?;

        let port = match env("PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| BuildError::configuration(format!("invalid PORT {port:?}")))?,
            None => settings.port.unwrap_or(DEFAULT_PORT),
        };

        let github = GithubConfig {
            owner: env("GITHUB_OWNER").or(settings.github.owner),
            repo: env("GITHUB_REPO").or(settings.github.repo),
            token: env("GITHUB_TOKEN").or(settings.github.token),
        };

        Ok(Self {
            bundled_templates: bundled_templates_dir(),
            project_dir,
            base_url,
            port,
            theme: settings.theme,
            static_files: settings
                .static_files
                .unwrap_or_else(|| vec!["favicon.ico".to_string(), "robots.txt".to_string()]),
            plugins: settings.plugins,
            seo: settings.seo,
            github,
        })
    }

    /// Absolute URL for a site-relative path. The base URL is always treated
    /// as a directory, so `https://host/docs` + `a.html` is `https://host/docs/a.html`.
    pub fn make_permalink(&self, path: &str) -> Url {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }

        let path = path.trim_start_matches('/');
        match base.join(path) {
            Ok(url) => url,
            Err(e) => {
                warn!("cannot join {path:?} onto {base}: {e}");
                base
            }
        }
    }
}

/// `templates/default` shipped next to the executable, or the crate's own copy
/// when running from a checkout.
fn bundled_templates_dir() -> PathBuf {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("templates").join("default")));

    match beside_exe {
        Some(dir) if dir.is_dir() => dir,
        _ => Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("templates")
            .join("default"),
    }
}
