use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::warn;
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_PRIORITY: f64 = 0.8;

/// A Markdown file discovered by the walker.
#[derive(Debug, Clone)]
pub struct ContentFile {
    pub absolute_path: PathBuf,
    /// Relative to the content root, e.g. `guide/intro.md`.
    pub relative_path: PathBuf,
    pub raw_text: String,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    #[default]
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl FromStr for ChangeFreq {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "always" => ChangeFreq::Always,
            "hourly" => ChangeFreq::Hourly,
            "daily" => ChangeFreq::Daily,
            "weekly" => ChangeFreq::Weekly,
            "monthly" => ChangeFreq::Monthly,
            "yearly" => ChangeFreq::Yearly,
            "never" => ChangeFreq::Never,
            other => return Err(format!("unknown changefreq {other:?}")),
        })
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeFreq::Always => "always",
            ChangeFreq::Hourly => "hourly",
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
            ChangeFreq::Never => "never",
        };
        f.write_str(s)
    }
}

/// One sitemap entry per built page.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// Output-relative URL path, `/` separated.
    pub path: String,
    pub lastmod: String,
    pub priority: f64,
    pub changefreq: ChangeFreq,
}

impl PageRecord {
    /// Reads `priority` and `changefreq` from frontmatter, falling back to the
    /// defaults (with a warning) when they are unusable.
    pub fn new(path: String, lastmod: String, data: &Map<String, Value>) -> Self {
        let priority = match data.get("priority") {
            None => DEFAULT_PRIORITY,
            Some(value) => match priority_of(value) {
                Some(p) if (0.0..=1.0).contains(&p) => p,
                _ => {
                    warn!("{path}: priority {value} is not between 0.0 and 1.0, using {DEFAULT_PRIORITY}");
                    DEFAULT_PRIORITY
                }
            },
        };

        let changefreq = match data.get("changefreq") {
            None => ChangeFreq::default(),
            Some(Value::String(s)) => s.parse().unwrap_or_else(|e| {
                warn!("{path}: {e}, using weekly");
                ChangeFreq::default()
            }),
            Some(other) => {
                warn!("{path}: changefreq {other} is not a string, using weekly");
                ChangeFreq::default()
            }
        };

        Self {
            path,
            lastmod,
            priority,
            changefreq,
        }
    }
}

fn priority_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Where a content file lands in the output directory.
///
/// `index.md` becomes `index.html` in its own directory; `content.md` does too
/// unless an `index.md` sits next to it.
pub fn output_path(relative_path: &Path, has_index_sibling: bool) -> PathBuf {
    let stem = relative_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let file_name = match stem.as_str() {
        "index" => "index.html".to_string(),
        "content" if !has_index_sibling => "index.html".to_string(),
        _ => format!("{stem}.html"),
    };

    match relative_path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// `./` at the output root, then one `../` per directory level.
pub fn asset_prefix(output_path: &Path) -> String {
    let depth = output_path
        .parent()
        .map(|p| p.components().count())
        .unwrap_or(0);

    if depth == 0 {
        "./".to_string()
    } else {
        "../".repeat(depth)
    }
}

pub fn url_path(output_path: &Path) -> String {
    output_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
