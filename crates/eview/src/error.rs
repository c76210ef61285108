//! Error types.
//!
//! Only setup and teardown produce `Err` values. What happens to a render run
//! (launch failure, nonzero exit) is an outcome, see [`crate::model::RunResult`].

use crate::model::PathKind;
use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type EviewResult<T> = Result<T, EviewError>;

#[derive(Debug, Error, Diagnostic)]
pub enum EviewError {
    #[error("failed to create session workspace under {parent}")]
    #[diagnostic(
        code(eview::workspace),
        help("set `scratch_root` in the eview config to a writable directory")
    )]
    Workspace {
        parent: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error("failed to read config file {path}")]
    #[diagnostic(code(eview::config))]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}")]
    #[diagnostic(code(eview::config))]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("invalid config value: {0}")]
    #[diagnostic(code(eview::config))]
    ConfigValue(String),

    #[error("failed to remove workspace {path}")]
    #[diagnostic(code(eview::cleanup))]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A redirection target could not be read or written.
///
/// Never fatal: the previous binding stays active and the session shows the
/// message as a notice.
#[derive(Debug, Error, Diagnostic)]
#[error("cannot use {} as the {which} file", path.display())]
#[diagnostic(code(eview::path))]
pub struct PathError {
    pub which: PathKind,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl PathError {
    pub(crate) fn new(which: PathKind, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            which,
            path: path.into(),
            source,
        }
    }

    /// One-line message including the underlying cause.
    pub fn notice(&self) -> String {
        format!("{self}: {}", self.source)
    }
}
