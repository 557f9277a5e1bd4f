//! llama.cpp backed inference engine.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::{send_logs_to_tracing, LogOptions};
use log::{debug, info};

use crate::config::{Config, SamplingConfig};
use crate::error::{InferenceError, LoadError};

use super::{InferenceEngine, ModelLoader};

// llama.cpp may only be initialized once per process.
static BACKEND: OnceLock<LlamaBackend> = OnceLock::new();
static BACKEND_INIT: Mutex<()> = Mutex::new(());

fn backend() -> Result<&'static LlamaBackend, String> {
    if let Some(backend) = BACKEND.get() {
        return Ok(backend);
    }

    let _lock = BACKEND_INIT
        .lock()
        .map_err(|_| "backend init lock poisoned".to_string())?;
    if let Some(backend) = BACKEND.get() {
        return Ok(backend);
    }

    // llama.cpp writes to stderr by default; route it through the tracing subscriber
    send_logs_to_tracing(LogOptions::default());

    info!("Initializing LLM backend...");
    let backend = LlamaBackend::init().map_err(|e| e.to_string())?;
    Ok(BACKEND.get_or_init(|| backend))
}

pub struct LlamaLoader {
    context_size: u32,
    threads: usize,
    sampling: SamplingConfig,
}

impl LlamaLoader {
    pub fn new(context_size: u32, threads: usize) -> Self {
        Self {
            context_size,
            threads,
            sampling: SamplingConfig::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.model.context_size, config.model.threads)
            .with_sampling(config.generation.sampling.clone())
    }
}

impl ModelLoader for LlamaLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn InferenceEngine>, LoadError> {
        let corrupt = |reason: String| LoadError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let backend = backend().map_err(|e| corrupt(format!("backend init failed: {}", e)))?;

        info!("Loading model from: {}", path.display());
        let model_params = LlamaModelParams::default();
        let model = LlamaModel::load_from_file(backend, path, &model_params)
            .map_err(|e| corrupt(e.to_string()))?;

        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.context_size))
            .with_n_threads(self.threads as i32)
            .with_n_threads_batch(self.threads as i32);

        info!("Model loaded ({} ctx, {} threads)", self.context_size, self.threads);
        Ok(Box::new(LlamaEngine {
            model,
            ctx_params,
            context_size: self.context_size as usize,
            sampling: self.sampling.clone(),
        }))
    }
}

pub struct LlamaEngine {
    model: LlamaModel,
    ctx_params: LlamaContextParams,
    context_size: usize,
    sampling: SamplingConfig,
}

/// Builds a fresh sampler chain: top-k, top-p, min-p, temperature, then a
/// seeded draw. Identical prompts give identical output for a fixed seed.
fn build_sampler(sampling: &SamplingConfig) -> LlamaSampler {
    if sampling.is_greedy() {
        return LlamaSampler::greedy();
    }

    let mut chain = Vec::with_capacity(5);
    if sampling.top_k > 0 {
        chain.push(LlamaSampler::top_k(sampling.top_k as i32));
    }
    if sampling.top_p < 1.0 {
        chain.push(LlamaSampler::top_p(sampling.top_p, 1));
    }
    if sampling.min_p > 0.0 {
        chain.push(LlamaSampler::min_p(sampling.min_p, 1));
    }
    chain.push(LlamaSampler::temp(sampling.temperature));
    chain.push(LlamaSampler::dist(sampling.seed));

    LlamaSampler::chain_simple(chain)
}

// SAFETY: the model weights are only read after loading. Every `infer` call
// creates its own context (and KV cache) and never shares it, and the backend
// is a process-wide static that is never mutated after init.
unsafe impl Send for LlamaEngine {}
unsafe impl Sync for LlamaEngine {}

impl InferenceEngine for LlamaEngine {
    fn infer(
        &self,
        prompt: &str,
        max_tokens: usize,
        cancel: &AtomicBool,
    ) -> Result<String, InferenceError> {
        let internal = |what: &str, e: &dyn std::fmt::Display| {
            InferenceError::Internal(format!("{}: {}", what, e))
        };

        let backend = backend().map_err(InferenceError::Internal)?;
        let mut ctx = self
            .model
            .new_context(backend, self.ctx_params.clone())
            .map_err(|e| internal("Failed to create context", &e))?;

        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| internal("Failed to tokenize prompt", &e))?;

        let n_tokens = tokens.len();
        debug!("Tokenized prompt into {} tokens", n_tokens);
        if n_tokens == 0 || n_tokens >= self.context_size {
            return Err(InferenceError::Internal(format!(
                "Prompt of {} tokens does not fit a {} token context",
                n_tokens, self.context_size
            )));
        }
        let max_tokens = max_tokens.min(self.context_size - n_tokens);

        let mut batch = LlamaBatch::new(self.context_size, 1);
        for (i, token) in tokens.iter().enumerate() {
            let is_last = i == n_tokens - 1;
            batch
                .add(*token, i as i32, &[0], is_last)
                .map_err(|e| internal("Failed to add token", &e))?;
        }

        ctx.decode(&mut batch)
            .map_err(|e| internal("Failed to decode prompt", &e))?;

        let mut sampler = build_sampler(&self.sampling);
        let mut output = String::new();
        let mut n_cur = n_tokens;

        for _ in 0..max_tokens {
            if cancel.load(Ordering::Acquire) {
                debug!("Generation cancelled after {} tokens", n_cur - n_tokens);
                return Err(InferenceError::Timeout);
            }

            let new_token = sampler.sample(&ctx, batch.n_tokens() - 1);

            if self.model.is_eog_token(new_token) {
                break;
            }

            let token_str = self
                .model
                .token_to_str(new_token, Special::Tokenize)
                .map_err(|e| internal("Failed to decode token", &e))?;
            output.push_str(&token_str);

            // commit subjects are a single line
            if output.trim_start().contains('\n') {
                break;
            }

            batch.clear();
            batch
                .add(new_token, n_cur as i32, &[0], true)
                .map_err(|e| internal("Failed to add token", &e))?;

            ctx.decode(&mut batch)
                .map_err(|e| internal("Failed to decode", &e))?;

            n_cur += 1;
        }

        Ok(output)
    }
}
