use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{info, warn};
use walkdir::WalkDir;

use crate::{
    context::{path_exists, Context},
    sidebar::SIDEBAR_FILE,
    template::TEMPLATE_EXTENSION,
    theme::{ThemeManager, STYLESHEET},
};

/// Copies static files into the output directory. Later steps overwrite
/// earlier ones: theme assets, template `assets/`, project `public/`,
/// declared static files, then loose top-level template files.
///
/// Returns the number of files copied. Copy failures are logged and skipped.
pub fn copy_static_assets(context: &Context) -> usize {
    let mut copied = copy_theme_assets(context);

    let assets_dir = context.template_dir.join("assets");
    copied += copy_dir(context, &assets_dir, Path::new("assets"));

    let public_dir = context.absolute("public");
    copied += copy_dir(context, &public_dir, Path::new(""));

    for name in &context.config.static_files {
        let file = context.template_dir.join(name);
        if file.is_file() && copy_file(context, &file, Path::new(name)) {
            copied += 1;
        }
    }

    for file in loose_template_files(&context.template_dir) {
        if let Some(name) = file.file_name() {
            if copy_file(context, &file, Path::new(name)) {
                copied += 1;
            }
        }
    }

    copied
}

fn copy_theme_assets(context: &Context) -> usize {
    let Some(name) = context.config.theme.as_deref() else {
        return 0;
    };

    let theme = match ThemeManager::new(&context.config.project_dir).get(name) {
        Ok(theme) => theme,
        Err(e) => {
            warn!("{e:#}, building without a theme");
            return 0;
        }
    };

    let mut copied = theme
        .assets_dir()
        .map(|dir| copy_dir(context, &dir, Path::new("assets")))
        .unwrap_or(0);

    if !theme.has_stylesheet() {
        match context.write_to_output(Path::new(STYLESHEET), &theme.stylesheet()) {
            Ok(()) => copied += 1,
            Err(e) => warn!("cannot write theme stylesheet: {e}"),
        }
    }

    info!("applied theme {}", theme.name);
    copied
}

fn copy_dir(context: &Context, source: &Path, destination: &Path) -> usize {
    if !path_exists(source) {
        info!("no {} directory, skipping", context.relative(source).display());
        return 0;
    }

    let mut copied = 0;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("cannot read {}: {}", source.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };

        if copy_file(context, entry.path(), &destination.join(relative)) {
            copied += 1;
        }
    }

    info!(
        "copied {} files from {}",
        copied,
        context.relative(source).display()
    );
    copied
}

fn copy_file(context: &Context, file: &Path, path: &Path) -> bool {
    match context.copy_to_output(file, path) {
        Ok(()) => true,
        Err(e) => {
            warn!("{e}");
            false
        }
    }
}

/// Top-level template files that are neither templates, Markdown, the sidebar,
/// nor hidden.
fn loose_template_files(template_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(template_dir) else {
        return vec![];
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();

            !name.starts_with('.')
                && name != SIDEBAR_FILE
                && extension != TEMPLATE_EXTENSION
                && extension != "md"
        })
        .collect();

    files.sort();
    files
}
