use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GtallyError>;

#[derive(Error, Debug)]
pub enum GtallyError {
    #[error("Discovery error at {path}: {reason}")]
    Discovery { path: PathBuf, reason: String },
    #[error("Extraction error in {repo}: {message}")]
    Extraction { repo: PathBuf, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Git repository error: {0}")]
    GitRepo(String),
}

impl GtallyError {
    pub fn discovery(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GtallyError::Discovery {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn extraction(repo: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        GtallyError::Extraction {
            repo: repo.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        GtallyError::Config(message.into())
    }

    /// Fatal errors abort the run; everything else is recorded as a [`Failure`].
    pub fn is_fatal(&self) -> bool {
        matches!(self, GtallyError::Config(_))
    }
}

impl From<gix::open::Error> for GtallyError {
    fn from(err: gix::open::Error) -> Self {
        GtallyError::GitRepo(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Discovery,
    Extraction,
    Parse,
}

/// A recovered error, kept next to the results for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Failure {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(path: &Path, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(path: &Path, err: &GtallyError) -> Self {
        let kind = match err {
            GtallyError::Discovery { .. } | GtallyError::GitRepo(_) => FailureKind::Discovery,
            GtallyError::Parse(_) => FailureKind::Parse,
            _ => FailureKind::Extraction,
        };
        Self::new(path, kind, err.to_string())
    }
}
