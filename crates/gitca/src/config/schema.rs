use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            model: ModelConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Where the model artifact comes from and how the runtime is sized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Explicit path to a GGUF artifact. Takes precedence over `id`.
    #[serde(default)]
    pub path: Option<String>,
    /// Catalog id of the model to resolve inside `cache_dir`.
    #[serde(default = "default_model_id")]
    pub id: String,
    /// Directory to cache downloaded models.
    #[serde(default = "default_model_cache")]
    pub cache_dir: String,
    /// Context window in tokens.
    #[serde(default = "default_context_size")]
    pub context_size: u32,
    /// Threads used for prompt ingestion and decoding.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Artifacts smaller than this are rejected as corrupt. Zero disables the check.
    #[serde(default)]
    pub min_artifact_bytes: u64,
}

fn default_model_id() -> String {
    crate::engine::store::DEFAULT_MODEL_ID.to_string()
}

fn default_model_cache() -> String {
    // Use platform-specific cache directory from dirs crate
    dirs::cache_dir()
        .map(|p| p.join("git-ca").join("models").to_string_lossy().to_string())
        .unwrap_or_else(|| {
            if cfg!(target_os = "windows") {
                std::env::var("LOCALAPPDATA")
                    .map(|p| format!("{}\\git-ca\\models", p))
                    .unwrap_or_else(|_| "C:\\ProgramData\\git-ca\\models".to_string())
            } else {
                dirs::home_dir()
                    .map(|p| {
                        p.join(".cache")
                            .join("git-ca")
                            .join("models")
                            .to_string_lossy()
                            .to_string()
                    })
                    .unwrap_or_else(|| "/tmp/git-ca/models".to_string())
            }
        })
}

fn default_context_size() -> u32 {
    8192
}

fn default_threads() -> usize {
    num_cpus::get().max(1)
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            id: default_model_id(),
            cache_dir: default_model_cache(),
            context_size: default_context_size(),
            threads: default_threads(),
            min_artifact_bytes: 0,
        }
    }
}

/// What happens to a diff longer than `max_input_chars`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizePolicy {
    /// Refuse the request with `ValidationError::TooLong`.
    #[default]
    Reject,
    /// Keep the first `max_input_chars` characters and flag the request as truncated.
    Truncate,
}

/// Language the commit message is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    #[serde(alias = "english")]
    En,
    #[serde(alias = "chinese")]
    Zh,
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "zh" | "chinese" => Ok(Self::Zh),
            other => Err(format!("unsupported language '{}', expected en or zh", other)),
        }
    }
}

/// Bounds applied to every generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default)]
    pub oversize_policy: OversizePolicy,
    /// Upper bound on raw model output, in characters (also the token budget).
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    /// Upper bound on the final commit subject line.
    #[serde(default = "default_max_subject_chars")]
    pub max_subject_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of generations allowed to overlap on one loaded model.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub sampling: SamplingConfig,
}

/// Token sampling for the llama engine. A temperature of zero samples greedily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Zero disables top-k filtering.
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default)]
    pub min_p: f32,
    #[serde(default = "default_seed")]
    pub seed: u32,
}

fn default_temperature() -> f32 {
    0.8
}

fn default_top_k() -> u32 {
    40
}

fn default_top_p() -> f32 {
    0.9
}

fn default_seed() -> u32 {
    42
}

impl SamplingConfig {
    pub fn is_greedy(&self) -> bool {
        self.temperature <= 0.0
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            min_p: 0.0,
            seed: default_seed(),
        }
    }
}

fn default_max_input_chars() -> usize {
    16_000
}

fn default_max_output_chars() -> usize {
    256
}

fn default_max_subject_chars() -> usize {
    72
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_concurrency() -> usize {
    1
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            oversize_policy: OversizePolicy::default(),
            max_output_chars: default_max_output_chars(),
            max_subject_chars: default_max_subject_chars(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            language: Language::default(),
            sampling: SamplingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert!(config.model.path.is_none());
        assert_eq!(config.model.context_size, 8192);
        assert!(config.model.threads >= 1);
        assert_eq!(config.generation.oversize_policy, OversizePolicy::Reject);
        assert_eq!(config.generation.concurrency, 1);
        assert_eq!(config.generation.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_sampling_defaults_and_partial_override() {
        let sampling = SamplingConfig::default();
        assert_eq!(sampling.top_k, 40);
        assert!(!sampling.is_greedy());

        let config: GenerationConfig =
            serde_json::from_str(r#"{ "sampling": { "temperature": 0.0 } }"#).unwrap();
        assert!(config.sampling.is_greedy());
        assert_eq!(config.sampling.top_p, 0.9);
        assert_eq!(config.sampling.seed, 42);
    }

    #[test]
    fn test_enums_use_lowercase_names() {
        let json = serde_json::to_string(&OversizePolicy::Truncate).unwrap();
        assert_eq!(json, "\"truncate\"");

        let lang: Language = serde_json::from_str("\"chinese\"").unwrap();
        assert_eq!(lang, Language::Zh);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert_eq!("zh".parse::<Language>().unwrap(), Language::Zh);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_model_cache_dir_is_app_scoped() {
        let config = ModelConfig::default();
        assert!(config.cache_dir.contains("git-ca"));
    }
}
