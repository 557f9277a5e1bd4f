pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod sanitize;
pub mod session;

pub use config::{
    load_config, Config, GenerationConfig, Language, ModelConfig, OversizePolicy, SamplingConfig,
};
pub use engine::{InferenceEngine, ModelLoader, ModelStore};
pub use error::{
    ConfigError, GitcaError, InferenceError, LoadError, Result, StoreError, UnloadError,
    ValidationError,
};
pub use pipeline::{FailureKind, GenerationRequest, GenerationResult, Pipeline};
pub use session::{ModelHandle, SessionManager, SessionSnapshot, SessionState};
