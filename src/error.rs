use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by the build pipeline.
///
/// Per-file errors (`FileFormat`, `Render`) are logged by the walker and the
/// build moves on to the next file. Everything else aborts the build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed content in {}: {message}", path.display())]
    FileFormat { path: PathBuf, message: String },

    #[error("failed to render {}: {message}", path.display())]
    Render { path: PathBuf, message: String },

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no HTML files were generated")]
    EmptyOutput,
}

impl BuildError {
    pub fn configuration(message: impl Into<String>) -> Self {
        BuildError::Configuration(message.into())
    }

    pub fn file_format(path: &Path, message: impl ToString) -> Self {
        BuildError::FileFormat {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn render(path: &Path, error: &tera::Error) -> Self {
        BuildError::Render {
            path: path.to_path_buf(),
            message: describe(error),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BuildError::Configuration(_) | BuildError::Io { .. } | BuildError::EmptyOutput
        )
    }
}

/// Tera hides the useful part of its messages in the source chain.
pub fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
