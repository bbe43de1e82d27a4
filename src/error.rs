use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while fixing broken links.
///
/// Only `Parse`, `Config` and `Output` ever terminate a run. The other
/// variants are caught by the resolver or the worker pool and recorded in the
/// report as data.
#[derive(Debug, Error)]
pub enum Error {
    /// The broken-link catalogue could not be read
    #[error("failed to read catalogue {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Network-level failure while probing for a redirect
    #[error("redirect probe failed for {url}: {source}")]
    Probe {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A page failed to load, an element was missing or a session was lost
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Uncaught failure inside one worker's job
    #[error("job failed: {0}")]
    Job(String),

    /// The report could not be persisted
    #[error("failed to write report {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The report could not be serialized
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Invalid or unreadable configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<fantoccini::error::CmdError> for Error {
    fn from(error: fantoccini::error::CmdError) -> Self {
        Error::Navigation(error.to_string())
    }
}

impl From<fantoccini::error::NewSessionError> for Error {
    fn from(error: fantoccini::error::NewSessionError) -> Self {
        Error::Navigation(format!("could not open WebDriver session: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
