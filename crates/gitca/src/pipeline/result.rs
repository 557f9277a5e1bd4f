use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, ValidationError};

/// Why a generation produced no message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ModelNotLoaded,
    TooLong,
    EmptyInput,
    Timeout,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ModelNotLoaded => "model_not_loaded",
            Self::TooLong => "too_long",
            Self::EmptyInput => "empty_input",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Outcome of a generation call.
///
/// Serializes as a bare JSON string on success and as `{"kind", "message"}`
/// on failure, so a short answer can never be mistaken for an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationResult {
    Success(String),
    Failure { kind: FailureKind, message: String },
}

impl GenerationResult {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The generated text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success(text) => Some(text),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<ValidationError> for GenerationResult {
    fn from(err: ValidationError) -> Self {
        let kind = match err {
            ValidationError::TooLong { .. } => FailureKind::TooLong,
            ValidationError::Empty => FailureKind::EmptyInput,
        };
        Self::failure(kind, err.to_string())
    }
}

impl From<InferenceError> for GenerationResult {
    fn from(err: InferenceError) -> Self {
        let kind = match err {
            InferenceError::Timeout => FailureKind::Timeout,
            InferenceError::Internal(_) => FailureKind::Internal,
        };
        Self::failure(kind, err.to_string())
    }
}

impl fmt::Display for GenerationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(text) => f.write_str(text),
            Self::Failure { kind, message } => write!(f, "[{}] {}", kind, message),
        }
    }
}
