use reqwest::StatusCode;
use thiserror::Error;

use crate::config::MetadataConfigError;

/// Failures observed while talking to the metadata service.
///
/// Lookup operations on [`crate::MetadataClient`] log these and collapse them to `None`;
/// only [`crate::MetadataClient::new`] returns one to the caller.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("metadata service responded with {status}")]
    Upstream { status: StatusCode },
    #[error("metadata service returned an empty token")]
    EmptyToken,
    #[error("metadata attribute path is empty")]
    EmptyPath,
    #[error(transparent)]
    Config(#[from] MetadataConfigError),
    #[error("failed to build metadata http client: {0}")]
    Client(reqwest::Error),
}

impl MetadataError {
    /// Indicates whether the failure was the per-call timeout elapsing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MetadataError::Transport(err) if err.is_timeout())
    }
}
