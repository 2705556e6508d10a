use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Failures raised by a browser session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no element matches {locator}")]
    NotFound { locator: String },

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("script failed: {0}")]
    Script(String),

    #[error("element interaction failed: {0}")]
    Interaction(String),

    /// The browser no longer answers. Nothing else can be done with this session.
    #[error("browser session unavailable: {0}")]
    Connection(String),
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Connection(_))
    }
}

#[derive(Debug, Error)]
pub enum ScrollError {
    #[error("container kept growing after {budget:?} (last extent {last_extent})")]
    StabilizationTimeout { budget: Duration, last_extent: i64 },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A mandatory field could not be read from the rendered page.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("element {element} has no {attribute} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: String,
    },
}

/// Aborts the whole extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("browser session lost: {0}")]
    SessionLost(#[source] SessionError),
}

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("selector for {role} is invalid: {selector}")]
    Invalid { role: &'static str, selector: String },
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to access artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode run document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("artifact {path} is not a valid run document: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no pending artifact at {0}")]
    ArtifactMissing(PathBuf),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("staging database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Rows are committed but the artifact still carries its pending name.
    #[error("rows committed but artifact {path} could not be marked: {source}")]
    MarkerFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
