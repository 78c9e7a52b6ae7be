use thiserror::Error;

use crate::config::ConfigError;
use hostecho_metadata::MetadataError;

pub type Result<T> = std::result::Result<T, HostechoError>;

#[derive(Debug, Error)]
pub enum HostechoError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
