use std::{
    fs::{self, create_dir_all, remove_dir_all},
    path::{Path, PathBuf},
};

use crate::{config::Config, error::BuildError};

/// Template, content and output locations for one project, plus helpers for
/// writing into the output directory.
pub struct Context {
    pub config: Config,
    pub template_dir: PathBuf,
    pub content_dir: PathBuf,
    pub output_dir: PathBuf,
}

pub fn path_exists(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

impl Context {
    /// A local `templates/default` overrides the bundled one. Whether the
    /// chosen directory exists is only checked by [`Context::verify`].
    pub fn new(config: Config) -> Self {
        let home = &config.project_dir;

        let local_templates = home.join("templates").join("default");
        let template_dir = if path_exists(&local_templates) {
            local_templates
        } else {
            config.bundled_templates.clone()
        };

        let content_dir = home.join("content");
        let content_dir = if content_dir.is_dir() {
            content_dir
        } else {
            template_dir.clone()
        };

        let output_dir = home.join("dist");

        Self {
            config,
            template_dir,
            content_dir,
            output_dir,
        }
    }

    pub fn verify(&self) -> Result<(), BuildError> {
        if !self.template_dir.is_dir() {
            return Err(BuildError::configuration(format!(
                "templates not found at {}",
                self.template_dir.display()
            )));
        }

        Ok(())
    }

    pub fn absolute<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.config.project_dir.join(path.as_ref())
    }

    /// Path shown in log lines: relative to the project when possible.
    pub fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.config.project_dir).unwrap_or(path)
    }

    pub fn clean_output_dir(&self) -> Result<(), BuildError> {
        if path_exists(&self.output_dir) {
            remove_dir_all(&self.output_dir).map_err(|e| BuildError::io(&self.output_dir, e))?;
        }
        create_dir_all(&self.output_dir).map_err(|e| BuildError::io(&self.output_dir, e))?;
        Ok(())
    }

    pub fn create_output_dir(&self, path: &Path) -> Result<(), BuildError> {
        let output = self.output_dir.join(path);
        create_dir_all(&output).map_err(|e| BuildError::io(&output, e))
    }

    pub fn copy_to_output(&self, file: &Path, path: &Path) -> Result<(), BuildError> {
        path.parent()
            .map(|p| self.create_output_dir(p))
            .transpose()?;

        let output = self.output_dir.join(path);

        fs::copy(file, &output).map_err(|e| BuildError::io(&output, e))?;

        Ok(())
    }

    pub fn write_to_output(&self, path: &Path, contents: &str) -> Result<(), BuildError> {
        path.parent()
            .map(|p| self.create_output_dir(p))
            .transpose()?;

        let output = self.output_dir.join(path);

        fs::write(&output, contents).map_err(|e| BuildError::io(&output, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(project: &Path) -> Config {
        let mut config = Config::load_with_env(project.into(), |_| None).unwrap();
        config.bundled_templates = project.join("bundled");
        config
    }

    #[test]
    fn local_templates_win_over_bundled() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates/default")).unwrap();
        fs::create_dir_all(dir.path().join("bundled")).unwrap();

        let context = Context::new(config_for(dir.path()));

        assert_eq!(context.template_dir, dir.path().join("templates/default"));
        assert_eq!(context.content_dir, context.template_dir);
        assert_eq!(context.output_dir, dir.path().join("dist"));
        assert!(context.verify().is_ok());
    }

    #[test]
    fn bundled_templates_are_the_fallback() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bundled")).unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();

        let context = Context::new(config_for(dir.path()));

        assert_eq!(context.template_dir, dir.path().join("bundled"));
        assert_eq!(context.content_dir, dir.path().join("content"));
    }

    #[test]
    fn missing_template_dir_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context::new(config_for(dir.path()));

        assert!(matches!(
            context.verify(),
            Err(BuildError::Configuration(_))
        ));
    }

    #[test]
    fn writes_create_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context::new(config_for(dir.path()));
        context.clean_output_dir().unwrap();

        context
            .write_to_output(Path::new("guide/deep/page.html"), "<p>hi</p>")
            .unwrap();

        let written = fs::read_to_string(dir.path().join("dist/guide/deep/page.html")).unwrap();
        assert_eq!(written, "<p>hi</p>");
    }

    #[test]
    fn cleaning_removes_stale_output() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context::new(config_for(dir.path()));
        fs::create_dir_all(dir.path().join("dist/old")).unwrap();
        fs::write(dir.path().join("dist/old/stale.html"), "").unwrap();

        context.clean_output_dir().unwrap();

        assert!(path_exists(&context.output_dir));
        assert!(!path_exists(&dir.path().join("dist/old")));
    }
}
