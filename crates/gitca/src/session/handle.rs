use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};

use crate::engine::InferenceEngine;
use crate::error::InferenceError;

/// A loaded model, exclusively owned by one `SessionManager`.
///
/// Dropping the handle drops the engine, which releases the model's memory.
pub struct ModelHandle {
    path: PathBuf,
    loaded_at: DateTime<Utc>,
    engine: Box<dyn InferenceEngine>,
}

impl ModelHandle {
    pub fn new(path: impl Into<PathBuf>, engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            path: path.into(),
            loaded_at: Utc::now(),
            engine,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Runs inference and bounds the output to `max_output_len` characters.
    pub fn run(&self, text: &str, max_output_len: usize) -> Result<String, InferenceError> {
        self.run_with_cancel(text, max_output_len, &AtomicBool::new(false))
    }

    /// Like [`ModelHandle::run`], stopping early once `cancel` is raised.
    pub fn run_with_cancel(
        &self,
        text: &str,
        max_output_len: usize,
        cancel: &AtomicBool,
    ) -> Result<String, InferenceError> {
        let mut output = self.engine.infer(text, max_output_len, cancel)?;

        if let Some((cut, _)) = output.char_indices().nth(max_output_len) {
            output.truncate(cut);
        }

        Ok(output)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("path", &self.path)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}
