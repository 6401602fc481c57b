use std::path::{Component, Path, PathBuf};

use log::{debug, warn};
use serde_json::{Map, Value};
use tera::Tera;

use crate::{
    context::{path_exists, Context},
    error::{describe, BuildError},
    functions::{get_url::GetURL, markdown::Markdown},
};

pub const TEMPLATE_EXTENSION: &str = "ejs";
pub const DEFAULT_LAYOUT: &str = "layout.ejs";
/// Single-template projects name their only template `index.ejs`.
pub const LEGACY_LAYOUT: &str = "index.ejs";

/// Loads every `*.ejs` under the template root into one engine.
pub fn setup_template_engine(context: &Context) -> Result<Tera, BuildError> {
    let glob = context
        .template_dir
        .join("**")
        .join(format!("*.{TEMPLATE_EXTENSION}"));

    let mut tera = Tera::new(&glob.to_string_lossy()).map_err(|e| {
        BuildError::configuration(format!(
            "cannot load templates from {}: {}",
            context.template_dir.display(),
            describe(&e)
        ))
    })?;

    tera.register_function("get_url", GetURL::new(context.config.clone()));
    tera.register_filter("markdown", Markdown {});

    debug!(
        "loaded templates: {:?}",
        tera.get_template_names().collect::<Vec<_>>()
    );

    Ok(tera)
}

/// Chooses the template for a content file. First match wins:
/// frontmatter `template`, `<stem>.ejs`, `<top-level dir>.ejs`, then the
/// default layout.
pub struct TemplateResolver {
    template_root: PathBuf,
}

impl TemplateResolver {
    pub fn new(template_root: PathBuf) -> Self {
        Self { template_root }
    }

    /// Returns the template name as the engine knows it (root-relative, `/` separated).
    pub fn resolve(
        &self,
        relative_path: &Path,
        data: &Map<String, Value>,
    ) -> Result<String, BuildError> {
        if let Some(requested) = data.get("template") {
            match self.requested(requested) {
                Some(name) => return Ok(name),
                None => warn!(
                    "{}: template {} not found, falling back to layout detection",
                    relative_path.display(),
                    requested
                ),
            }
        }

        if let Some(stem) = relative_path.file_stem() {
            let name = format!("{}.{TEMPLATE_EXTENSION}", stem.to_string_lossy());
            if self.exists(&name) {
                return Ok(name);
            }
        }

        if let Some(section) = top_level_dir(relative_path) {
            let name = format!("{section}.{TEMPLATE_EXTENSION}");
            if self.exists(&name) {
                return Ok(name);
            }
        }

        for name in [DEFAULT_LAYOUT, LEGACY_LAYOUT] {
            if self.exists(name) {
                return Ok(name.to_string());
            }
        }

        Err(BuildError::configuration(format!(
            "no {DEFAULT_LAYOUT} or {LEGACY_LAYOUT} in {}",
            self.template_root.display()
        )))
    }

    fn requested(&self, requested: &Value) -> Option<String> {
        let requested = requested.as_str()?.trim();
        if requested.is_empty() {
            return None;
        }

        let name = if requested.ends_with(&format!(".{TEMPLATE_EXTENSION}")) {
            requested.to_string()
        } else {
            format!("{requested}.{TEMPLATE_EXTENSION}")
        };
        let name = name.trim_start_matches('/').replace('\\', "/");

        // Only templates under the root are loaded by the engine.
        let escapes = Path::new(&name)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));

        (!escapes && self.exists(&name)).then_some(name)
    }

    fn exists(&self, name: &str) -> bool {
        let path = self.template_root.join(name);
        path_exists(&path) && path.is_file()
    }
}

fn top_level_dir(relative_path: &Path) -> Option<String> {
    let parent = relative_path.parent()?;
    match parent.components().next()? {
        Component::Normal(name) => Some(name.to_string_lossy().to_string()),
        _ => None,
    }
}
