//! Test harness for isolated session tests.
//!
//! The `TestHarness` owns a temporary directory holding model artifacts and
//! config files, and builds configs pointing into it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use gitca::config::{Config, OversizePolicy};
use gitca::engine::ModelLoader;
use gitca::{SessionManager, SessionState};

/// A minimal GGUF v3 header: magic, version, tensor count, metadata count.
pub fn gguf_header() -> Vec<u8> {
    let mut bytes = b"GGUF".to_vec();
    bytes.extend_from_slice(&3u32.to_le_bytes());
    bytes.extend_from_slice(&0u64.to_le_bytes());
    bytes.extend_from_slice(&0u64.to_le_bytes());
    bytes
}

pub struct TestHarness {
    temp_dir: TempDir,
    /// Directory for model artifacts within temp_dir.
    pub model_dir: PathBuf,
    /// Directory for config files within temp_dir.
    pub config_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let model_dir = temp_dir.path().join("models");
        let config_dir = temp_dir.path().join("config");

        std::fs::create_dir_all(&model_dir).expect("Failed to create model dir");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        Self {
            temp_dir,
            model_dir,
            config_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a valid (header-only) model artifact.
    pub fn write_model(&self, filename: &str) -> PathBuf {
        self.write_artifact(filename, &gguf_header())
    }

    /// Writes an artifact that fails header validation.
    pub fn write_corrupt_model(&self, filename: &str) -> PathBuf {
        self.write_artifact(filename, b"<html>404 Not Found</html>")
    }

    pub fn write_artifact(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.model_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write model artifact");
        path
    }

    /// A path inside the model dir that does not exist.
    pub fn missing_model(&self, filename: &str) -> PathBuf {
        self.model_dir.join(filename)
    }

    pub fn write_config_json(&self, filename: &str, json: &serde_json::Value) -> PathBuf {
        let path = self.config_dir.join(filename);
        let text = serde_json::to_string_pretty(json).expect("Failed to serialize config");
        std::fs::write(&path, text).expect("Failed to write config file");
        path
    }

    /// Default config with the model cache pointing into the harness.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.model.cache_dir = self.model_dir.to_string_lossy().to_string();
        config.model.threads = 1;
        config
    }

    pub fn config_with(&self, concurrency: usize, max_input_chars: usize) -> Config {
        let mut config = self.config();
        config.generation.concurrency = concurrency;
        config.generation.max_input_chars = max_input_chars;
        config
    }

    pub fn truncating_config(&self, max_input_chars: usize) -> Config {
        let mut config = self.config_with(1, max_input_chars);
        config.generation.oversize_policy = OversizePolicy::Truncate;
        config
    }

    pub fn session(&self, config: &Config, loader: impl ModelLoader + 'static) -> Arc<SessionManager> {
        Arc::new(SessionManager::with_loader(config, Arc::new(loader)))
    }

    pub fn session_with_timeout(
        &self,
        config: &Config,
        loader: impl ModelLoader + 'static,
        timeout: Duration,
    ) -> Arc<SessionManager> {
        Arc::new(SessionManager::with_loader(config, Arc::new(loader)).with_timeout(timeout))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls the session until it reports `state` or `timeout` elapses.
pub async fn wait_for_state(session: &SessionManager, state: SessionState, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if session.state().await == state {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
