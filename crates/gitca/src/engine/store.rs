//! Model catalog, cache resolution and Hugging Face downloads.

use std::path::{Path, PathBuf};

#[cfg(feature = "ai")]
use hf_hub::api::sync::Api;
#[cfg(feature = "ai")]
use hf_hub::{Repo, RepoType};
use log::debug;
#[cfg(feature = "ai")]
use log::info;
#[cfg(all(feature = "ai", unix))]
use log::warn;

use crate::config::ModelConfig;
use crate::error::StoreError;

/// A GGUF model known to work with the commit prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub repo: &'static str,
    pub file: &'static str,
    /// Approximate artifact size, used for progress reporting.
    pub approx_size_mb: u64,
}

pub const DEFAULT_MODEL_ID: &str = "qwen2.5-1.5b-instruct";

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "qwen2.5-1.5b-instruct",
        repo: "Qwen/Qwen2.5-1.5B-Instruct-GGUF",
        file: "qwen2.5-1.5b-instruct-q4_k_m.gguf",
        approx_size_mb: 900,
    },
    CatalogEntry {
        id: "qwen2.5-0.5b-instruct",
        repo: "Qwen/Qwen2.5-0.5B-Instruct-GGUF",
        file: "qwen2.5-0.5b-instruct-q4_k_m.gguf",
        approx_size_mb: 400,
    },
    CatalogEntry {
        id: "gemma-3-270m-it",
        repo: "unsloth/gemma-3-270m-it-GGUF",
        file: "gemma-3-270m-it-Q8_0.gguf",
        approx_size_mb: 290,
    },
    CatalogEntry {
        id: "phi-3-mini-4k-instruct",
        repo: "microsoft/Phi-3-mini-4k-instruct-gguf",
        file: "Phi-3-mini-4k-instruct-q4.gguf",
        approx_size_mb: 2300,
    },
    CatalogEntry {
        id: "mistral-7b-instruct-v0.3",
        repo: "bartowski/Mistral-7B-Instruct-v0.3-GGUF",
        file: "Mistral-7B-Instruct-v0.3-Q4_K_M.gguf",
        approx_size_mb: 4400,
    },
    CatalogEntry {
        id: "llama-3-8b-instruct",
        repo: "bartowski/Meta-Llama-3-8B-Instruct-GGUF",
        file: "Meta-Llama-3-8B-Instruct-Q4_K_M.gguf",
        approx_size_mb: 4900,
    },
];

/// Finds a catalog entry by id (case-insensitive).
pub fn lookup(id: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.id.eq_ignore_ascii_case(id))
}

/// Manages the on-disk model cache.
pub struct ModelStore {
    cache_dir: PathBuf,
}

impl ModelStore {
    /// Creates a new model store.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    /// Creates a model store from model config.
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(&config.cache_dir)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the cached model file.
    pub fn model_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let entry = lookup(id).ok_or_else(|| StoreError::UnknownModel(id.to_string()))?;
        Ok(self.cache_dir.join(entry.file))
    }

    /// Checks if the model is already downloaded.
    pub fn is_available(&self, id: &str) -> bool {
        self.model_path(id).map(|p| p.exists()).unwrap_or(false)
    }

    /// Returns the model size in bytes if available.
    pub fn model_size(&self, id: &str) -> Option<u64> {
        let path = self.model_path(id).ok()?;
        std::fs::metadata(path).ok().map(|m| m.len())
    }

    /// Lists the catalog with cache availability.
    pub fn list(&self) -> Vec<(&'static CatalogEntry, bool)> {
        CATALOG
            .iter()
            .map(|entry| (entry, self.cache_dir.join(entry.file).exists()))
            .collect()
    }

    /// Picks the artifact a config points at: an explicit path wins over the catalog id.
    pub fn resolve(&self, config: &ModelConfig) -> Result<PathBuf, StoreError> {
        match &config.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => self.model_path(&config.id),
        }
    }

    /// Ensures the model is available, downloading if necessary.
    #[cfg(feature = "ai")]
    pub fn ensure(&self, id: &str) -> Result<PathBuf, StoreError> {
        let entry = lookup(id).ok_or_else(|| StoreError::UnknownModel(id.to_string()))?;
        let model_path = self.cache_dir.join(entry.file);

        if model_path.exists() {
            debug!("Model already cached at: {}", model_path.display());
            return Ok(model_path);
        }

        std::fs::create_dir_all(&self.cache_dir)?;

        info!(
            "Downloading model {} from {} (~{} MB)...",
            entry.file, entry.repo, entry.approx_size_mb
        );

        let api = Api::new().map_err(|e| StoreError::Download(e.to_string()))?;
        let repo = api.repo(Repo::new(entry.repo.to_string(), RepoType::Model));

        let downloaded_path = repo
            .get(entry.file)
            .map_err(|e| StoreError::Download(e.to_string()))?;

        // hf-hub keeps its own cache; link into ours rather than duplicating the file
        info!("Model downloaded to: {}", downloaded_path.display());

        #[cfg(unix)]
        {
            if let Err(e) = std::os::unix::fs::symlink(&downloaded_path, &model_path) {
                warn!("Failed to create symlink, copying instead: {}", e);
                std::fs::copy(&downloaded_path, &model_path)?;
            }
        }

        #[cfg(not(unix))]
        {
            std::fs::copy(&downloaded_path, &model_path)?;
        }

        Ok(model_path)
    }

    /// Ensures the model is available (cache lookup only when the "ai" feature is disabled).
    #[cfg(not(feature = "ai"))]
    pub fn ensure(&self, id: &str) -> Result<PathBuf, StoreError> {
        let model_path = self.model_path(id)?;

        if model_path.exists() {
            debug!("Model already cached at: {}", model_path.display());
            return Ok(model_path);
        }

        Err(StoreError::DownloadUnavailable(id.to_string()))
    }

    /// Returns the friendly model name.
    pub fn model_name(id: &str) -> Option<String> {
        // "Qwen/Qwen2.5-1.5B-Instruct-GGUF" -> "Qwen2.5-1.5B-Instruct"
        lookup(id).map(|entry| {
            entry
                .repo
                .split('/')
                .next_back()
                .unwrap_or(entry.repo)
                .replace("-GGUF", "")
                .replace("-gguf", "")
        })
    }
}
