//! Inference engines and model artifacts.
//!
//! The numerical side of inference is hidden behind [`InferenceEngine`]. With
//! the "ai" feature enabled the default loader is backed by llama.cpp; without
//! it a deterministic diff-summarizing engine is used instead.

pub mod artifact;
pub mod heuristic;
#[cfg(feature = "ai")]
pub mod llama;
pub mod store;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{InferenceError, LoadError};

pub use artifact::{inspect, ArtifactInfo};
pub use heuristic::{HeuristicEngine, HeuristicLoader};
#[cfg(feature = "ai")]
pub use llama::{LlamaEngine, LlamaLoader};
pub use store::{CatalogEntry, ModelStore};

/// A loaded model that can continue a prompt.
pub trait InferenceEngine: Send + Sync {
    /// Generates at most `max_tokens` tokens after `prompt`.
    ///
    /// Implementations poll `cancel` between tokens and return
    /// [`InferenceError::Timeout`] once it is set.
    fn infer(
        &self,
        prompt: &str,
        max_tokens: usize,
        cancel: &AtomicBool,
    ) -> Result<String, InferenceError>;
}

/// Turns a validated artifact path into an engine.
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn InferenceEngine>, LoadError>;
}

/// Returns the loader selected by the enabled features.
#[cfg(feature = "ai")]
pub fn default_loader(config: &Config) -> Arc<dyn ModelLoader> {
    Arc::new(LlamaLoader::from_config(config))
}

/// Returns the loader selected by the enabled features.
#[cfg(not(feature = "ai"))]
pub fn default_loader(_config: &Config) -> Arc<dyn ModelLoader> {
    Arc::new(HeuristicLoader)
}
