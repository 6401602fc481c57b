use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context as _, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

pub const PLUGINS_DIR: &str = "plugins";
pub const MANIFEST_FILE: &str = "plugin.toml";

const SKIPPED: [&str; 3] = ["node_modules", ".git", "tests"];

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Registry name of the plugin variant this package enables.
    pub provides: String,
}

impl PluginManifest {
    pub fn load(plugin_dir: &Path) -> Result<Self> {
        let path = plugin_dir.join(MANIFEST_FILE);
        let text =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid {}", path.display()))
    }
}

#[derive(Debug)]
pub struct InstalledPlugin {
    pub dir_name: String,
    pub path: PathBuf,
    pub manifest: Result<PluginManifest>,
}

/// Places a plugin package may be found before installation, in search order.
fn candidates(project_dir: &Path, name: &str) -> [PathBuf; 3] {
    let node_modules = project_dir.join("node_modules");
    [
        node_modules.join(name),
        node_modules.join("@readme").join(name),
        project_dir.join(name),
    ]
}

pub fn locate(project_dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        bail!("invalid plugin name {name:?}");
    }

    let install_dir = project_dir.join(PLUGINS_DIR);
    candidates(project_dir, name)
        .into_iter()
        .filter(|dir| !dir.starts_with(&install_dir))
        .find(|dir| dir.join(MANIFEST_FILE).is_file())
        .with_context(|| {
            format!(
                "plugin {name} not found, looked in node_modules/{name}, node_modules/@readme/{name} and ./{name}"
            )
        })
}

/// Copies a plugin package into `plugins/<name>`.
pub fn install(project_dir: &Path, name: &str, force: bool) -> Result<InstalledPlugin> {
    let source = locate(project_dir, name)?;
    let manifest = PluginManifest::load(&source)?;

    let target = project_dir.join(PLUGINS_DIR).join(name);
    if target.exists() {
        if !force {
            bail!("plugin {name} is already installed, use --force to reinstall");
        }
        fs::remove_dir_all(&target)
            .with_context(|| format!("failed to remove {}", target.display()))?;
    }

    copy_package(&source, &target)?;
    info!(
        "installed plugin {} {} from {}",
        manifest.name,
        manifest.version,
        source.display()
    );

    Ok(InstalledPlugin {
        dir_name: name.to_string(),
        path: target,
        manifest: Ok(manifest),
    })
}

fn copy_package(source: &Path, target: &Path) -> Result<()> {
    let walker = WalkDir::new(source).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !SKIPPED
                .iter()
                .any(|skipped| entry.file_name() == *skipped)
    });

    for entry in walker {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source)?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)
                .with_context(|| format!("failed to create {}", destination.display()))?;
        } else {
            debug!("copying {}", relative.display());
            fs::copy(entry.path(), &destination)
                .with_context(|| format!("failed to copy {}", entry.path().display()))?;
        }
    }

    Ok(())
}

/// Every directory under `plugins/`, sorted by name. Manifests that fail to
/// load are reported per plugin rather than failing the listing.
pub fn installed_plugins(project_dir: &Path) -> Vec<InstalledPlugin> {
    let Ok(entries) = fs::read_dir(project_dir.join(PLUGINS_DIR)) else {
        return vec![];
    };

    let mut plugins: Vec<InstalledPlugin> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| {
            let path = entry.path();
            InstalledPlugin {
                dir_name: entry.file_name().to_string_lossy().to_string(),
                manifest: PluginManifest::load(&path),
                path,
            }
        })
        .collect();

    plugins.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
    plugins
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
name = "readme-plugin-menu"
version = "1.2.0"
description = "Menu API"
provides = "menu"
"#;

    fn package(dir: &Path) {
        fs::create_dir_all(dir.join("lib")).unwrap();
        fs::create_dir_all(dir.join("tests")).unwrap();
        fs::create_dir_all(dir.join("node_modules/dep")).unwrap();
        fs::write(dir.join(MANIFEST_FILE), MANIFEST).unwrap();
        fs::write(dir.join("lib/index.js"), "module.exports = {}").unwrap();
        fs::write(dir.join("tests/menu.test.js"), "").unwrap();
        fs::write(dir.join("node_modules/dep/index.js"), "").unwrap();
    }

    #[test]
    fn installs_from_node_modules() {
        let project = tempfile::tempdir().unwrap();
        package(&project.path().join("node_modules/@readme/menu"));

        let installed = install(project.path(), "menu", false).unwrap();

        let target = project.path().join("plugins/menu");
        assert_eq!(installed.path, target);
        assert!(target.join(MANIFEST_FILE).is_file());
        assert!(target.join("lib/index.js").is_file());
        assert!(!target.join("tests").exists());
        assert!(!target.join("node_modules").exists());
        assert_eq!(installed.manifest.unwrap().provides, "menu");
    }

    #[test]
    fn reinstall_needs_force() {
        let project = tempfile::tempdir().unwrap();
        package(&project.path().join("menu"));

        install(project.path(), "menu", false).unwrap();
        fs::write(project.path().join("plugins/menu/stale.txt"), "").unwrap();

        assert!(install(project.path(), "menu", false).is_err());
        install(project.path(), "menu", true).unwrap();
        assert!(!project.path().join("plugins/menu/stale.txt").exists());
    }

    #[test]
    fn missing_package() {
        let project = tempfile::tempdir().unwrap();
        assert!(install(project.path(), "menu", false).is_err());
        assert!(install(project.path(), "../menu", false).is_err());
    }

    #[test]
    fn never_installs_from_the_plugins_dir() {
        let project = tempfile::tempdir().unwrap();
        package(&project.path().join("plugins"));

        assert!(install(project.path(), "plugins", false).is_err());
        assert!(!project.path().join("plugins/plugins").exists());
    }

    #[test]
    fn lists_installed_plugins() {
        let project = tempfile::tempdir().unwrap();
        package(&project.path().join("plugins/menu"));
        fs::create_dir_all(project.path().join("plugins/broken")).unwrap();

        let plugins = installed_plugins(project.path());

        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].dir_name, "broken");
        assert!(plugins[0].manifest.is_err());
        assert_eq!(plugins[1].manifest.as_ref().unwrap().version, "1.2.0");
    }

    #[test]
    fn enabled_plugins_include_installed() {
        let project = tempfile::tempdir().unwrap();
        package(&project.path().join("plugins/menu"));

        let names = super::super::enabled_plugins(
            &["security-headers".to_string(), "menu".to_string()],
            project.path(),
        );
        assert_eq!(names, vec!["security-headers", "menu"]);
    }
}
