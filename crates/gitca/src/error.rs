use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitcaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model load error: {0}")]
    Load(#[from] LoadError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model store error: {0}")]
    Store(#[from] StoreError),
}

impl From<UnloadError> for GitcaError {
    fn from(err: UnloadError) -> Self {
        match err {}
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Model artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("Model artifact '{path}' is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Another model load is already in progress")]
    AlreadyLoading,
}

/// Unloading cannot fail; the type exists so the operation keeps a `Result`
/// signature alongside `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadError {}

impl fmt::Display for UnloadError {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl std::error::Error for UnloadError {}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Inference timed out")]
    Timeout,

    #[error("Inference failed: {0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Diff is too long: {len} characters (maximum {max})")]
    TooLong { len: usize, max: usize },

    #[error("Diff is empty")]
    Empty,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unknown model id: {0}")]
    UnknownModel(String),

    #[error("Failed to create cache directory: {0}")]
    CacheDirectory(#[from] std::io::Error),

    #[error("Failed to download model from Hugging Face: {0}")]
    Download(String),

    #[error("Model '{0}' is not cached and downloads need the `ai` feature")]
    DownloadUnavailable(String),
}

pub type Result<T> = std::result::Result<T, GitcaError>;
