pub mod loader;
pub mod schema;

pub use loader::{
    apply_env_overrides, default_config_path, load_config, load_config_from_str, validate_config,
    MODEL_PATH_ENV,
};
pub use schema::{
    Config, GenerationConfig, Language, ModelConfig, OversizePolicy, SamplingConfig,
};
