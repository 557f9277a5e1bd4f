use std::path::PathBuf;

use gitca::{ConfigError, GitcaError, LoadError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Gitca(#[from] GitcaError),

    #[error("Failed to read diff from '{path}': {source}")]
    ReadDiffFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read diff from stdin: {0}")]
    ReadStdin(#[source] std::io::Error),

    #[error("git diff failed: {0}")]
    Git(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl CliError {
    /// Process exit code for this error. Generation failures exit with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Gitca(GitcaError::Config(_)) | Self::Logging(_) => 2,
            Self::Gitca(GitcaError::Load(_) | GitcaError::Store(_)) => 3,
            Self::Gitca(_) => 1,
            Self::ReadDiffFile { .. } | Self::ReadStdin(_) | Self::Git(_) => 4,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Gitca(err.into())
    }
}

impl From<LoadError> for CliError {
    fn from(err: LoadError) -> Self {
        Self::Gitca(err.into())
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::Gitca(err.into())
    }
}
