//! Unified error type for renderforged.
//!
//! Every failure funnels into [`Error`], which carries enough context for the
//! HTTP layer to derive a status code via [`Error::http_status`]. Failures that
//! happen inside a render job never reach an HTTP caller; they are recorded on
//! the job instead.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a failed media metadata load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaLoadErrorKind {
    /// The load was interrupted before it finished.
    Aborted,
    /// The media could not be fetched (unreachable host, missing file, HTTP error).
    NetworkError,
    /// The media was fetched but could not be decoded.
    DecodeError,
    /// The container, codec or URL scheme is not supported.
    UnsupportedFormat,
    /// The load did not finish within the allotted time.
    Timeout,
    /// Anything that does not fit the other categories.
    Unknown,
}

impl MediaLoadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaLoadErrorKind::Aborted => "Aborted",
            MediaLoadErrorKind::NetworkError => "NetworkError",
            MediaLoadErrorKind::DecodeError => "DecodeError",
            MediaLoadErrorKind::UnsupportedFormat => "UnsupportedFormat",
            MediaLoadErrorKind::Timeout => "Timeout",
            MediaLoadErrorKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MediaLoadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure to load media metadata.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} loading {url}: {message}")]
pub struct MediaLoadError {
    pub kind: MediaLoadErrorKind,
    /// The URL whose metadata could not be loaded.
    pub url: String,
    pub message: String,
}

impl MediaLoadError {
    pub fn new(
        kind: MediaLoadErrorKind,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Unified error type covering all failure modes in renderforged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "render").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation conflicts with the current state of a resource.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Media metadata could not be loaded.
    #[error("Media load error: {0}")]
    MediaLoad(#[from] MediaLoadError),

    /// A render pipeline stage failed.
    #[error("Pipeline error [{step}]: {message}")]
    Pipeline {
        /// The stage that failed (bundle, select, render).
        step: String,
        message: String,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool { tool: String, message: String },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::MediaLoad(_) => 422,
            Error::Pipeline { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Validation(_) => "validation_error",
            Error::Conflict(_) => "conflict",
            Error::MediaLoad(_) => "media_load_error",
            Error::Pipeline { .. } => "pipeline_error",
            Error::Tool { .. } => "tool_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Pipeline`].
    pub fn pipeline(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Pipeline {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
