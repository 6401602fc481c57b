use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context as _, Result};
use log::info;

use crate::sidebar::{MenuItem, SidebarConfig, SIDEBAR_FILE};

const LAYOUT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ lang }}">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{{ title | escape }}</title>
  <meta name="description" content="{{ description | escape }}">
  <link rel="canonical" href="{{ canonicalUrl }}">
  <link rel="stylesheet" href="{{ assetPrefix }}assets/css/style.css">
</head>
<body>
  <nav class="sidebar">
    {% for item in navItems %}<a href="{{ assetPrefix }}{{ item.path }}.html">{{ item.title | escape }}</a>
    {% endfor %}
  </nav>
  <main class="content">
    {{ content }}
  </main>
</body>
</html>
"#;

/// Creates an empty file under the project. Markdown files get a heading and
/// a sidebar entry.
pub fn create_file(project_dir: &Path, name: &str) -> Result<PathBuf> {
    let path = project_path(project_dir, name)?;
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let is_markdown = path.extension().is_some_and(|ext| ext == "md");
    let contents = if is_markdown {
        format!("# {}\n", title_for(name))
    } else {
        String::new()
    };
    fs::write(&path, contents).with_context(|| format!("failed to create {}", path.display()))?;
    info!("created file {}", path.display());

    if is_markdown {
        let page = page_path(name);
        add_to_sidebar(
            project_dir,
            MenuItem {
                title: title_for(name),
                path: page,
                children: None,
            },
        )?;
    }

    Ok(path)
}

pub fn create_folder(project_dir: &Path, name: &str) -> Result<PathBuf> {
    let path = project_path(project_dir, name)?;
    fs::create_dir_all(&path).with_context(|| format!("failed to create {}", path.display()))?;
    info!("created folder {}", path.display());

    add_to_sidebar(
        project_dir,
        MenuItem {
            title: title_for(name),
            path: name.replace('\\', "/"),
            children: Some(vec![]),
        },
    )?;

    Ok(path)
}

/// Creates `templates/<name>/` with a layout, a home page and an empty sidebar.
pub fn create_template(project_dir: &Path, name: &str) -> Result<PathBuf> {
    let dir = project_path(&project_dir.join("templates"), name)?;
    if dir.exists() {
        bail!("template {} already exists at {}", name, dir.display());
    }

    fs::create_dir_all(dir.join("assets").join("css"))
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let files = [
        ("layout.ejs", LAYOUT_TEMPLATE.to_string()),
        (
            "index.md",
            format!("---\ntitle: {name}\n---\n# {name}\n\nThis is your new template content.\n"),
        ),
        (SIDEBAR_FILE, "{\"menu\": []}\n".to_string()),
        ("assets/css/style.css", String::new()),
    ];
    for (file, contents) in files {
        fs::write(dir.join(file), contents)
            .with_context(|| format!("failed to write {}", dir.join(file).display()))?;
    }

    info!("created template {}", dir.display());
    Ok(dir)
}

/// Only the project's own `templates/default/sidebar.json` is edited; a project
/// running on the bundled templates has no sidebar to update.
fn add_to_sidebar(project_dir: &Path, item: MenuItem) -> Result<()> {
    let template_dir = project_dir.join("templates").join("default");
    if !template_dir.is_dir() {
        info!("no local templates/default, sidebar left unchanged");
        return Ok(());
    }

    let sidebar_path = template_dir.join(SIDEBAR_FILE);
    let mut sidebar = SidebarConfig::load_strict(&sidebar_path)?;
    sidebar.push(item);
    sidebar.save(&sidebar_path)?;
    info!("updated {}", sidebar_path.display());

    Ok(())
}

/// Joins a user-supplied relative name onto `base`, refusing anything that
/// would land outside it.
fn project_path(base: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let inside = !name.trim().is_empty()
        && relative
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
    if !inside {
        bail!("{name:?} must be a relative path inside the project");
    }

    Ok(base.join(relative))
}

/// Sidebar path of a new page: relative to the content root, without `.md`.
fn page_path(name: &str) -> String {
    let name = name.replace('\\', "/");
    let name = name.trim_end_matches(".md");
    ["templates/default/", "content/"]
        .iter()
        .find_map(|root| name.strip_prefix(root))
        .unwrap_or(name)
        .to_string()
}

/// `getting-started.md` -> `Getting Started`.
fn title_for(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());

    stem.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
