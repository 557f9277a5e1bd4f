//! Model-inference session manager.
//!
//! A [`SessionManager`] owns at most one loaded [`ModelHandle`] and
//! coordinates access to it with two leases on the handle slot:
//!
//! - `generate` holds a shared lease (an owned read guard) for the whole
//!   inference, so a handle is never dropped while it is in use;
//! - `load` and `unload` take the exclusive lease to swap or drop the handle.
//!
//! Load and unload are additionally serialized by a transition lock, which
//! lets a load run its slow artifact work without holding the exclusive lease.
//! Readers therefore observe `Loading` instead of blocking.

mod handle;

pub use handle::ModelHandle;

use std::fmt;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{Config, GenerationConfig};
use crate::engine::{self, artifact, ModelLoader};
use crate::error::{LoadError, UnloadError};
use crate::pipeline::{FailureKind, GenerationResult, Pipeline};
use crate::sanitize::{fingerprint, hash_path, redact_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub model_path: Option<PathBuf>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

enum Slot {
    Unloaded,
    Loading { path: PathBuf },
    Ready(ModelHandle),
    Failed { path: PathBuf, error: LoadError },
}

impl Slot {
    fn state(&self) -> SessionState {
        match self {
            Self::Unloaded => SessionState::Unloaded,
            Self::Loading { .. } => SessionState::Loading,
            Self::Ready(_) => SessionState::Ready,
            Self::Failed { .. } => SessionState::Failed,
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Self::Unloaded => None,
            Self::Loading { path } | Self::Failed { path, .. } => Some(path),
            Self::Ready(handle) => Some(handle.path()),
        }
    }
}

fn log_transition(from: SessionState, to: SessionState, path: &Path) {
    info!(
        %from,
        %to,
        model = %redact_path(path),
        model_hash = %hash_path(path),
        "Session state changed"
    );
}

fn reset_abandoned(slot: &mut Slot) {
    if let Slot::Loading { path } = &*slot {
        warn!(model = %redact_path(path), "Model load was cancelled");
        *slot = Slot::Unloaded;
    }
}

/// Clears the loading flag on every exit path.
///
/// When the load future is dropped before it settles, a slot left in
/// `Loading` is put back to `Unloaded` before the flag is cleared. If readers
/// hold the slot at that moment the reset is finished on a spawned task, so
/// no other load can start until the slot is settled.
struct LoadGuard {
    loading: Arc<AtomicBool>,
    slot: Arc<RwLock<Slot>>,
    settled: bool,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if self.settled {
            self.loading.store(false, Ordering::Release);
            return;
        }

        if let Ok(mut slot) = self.slot.try_write() {
            reset_abandoned(&mut slot);
            self.loading.store(false, Ordering::Release);
            return;
        }

        let slot = Arc::clone(&self.slot);
        let loading = Arc::clone(&self.loading);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let mut slot = slot.write().await;
                    reset_abandoned(&mut slot);
                    loading.store(false, Ordering::Release);
                });
            }
            Err(_) => {
                warn!("No runtime to settle an abandoned model load");
                loading.store(false, Ordering::Release);
            }
        }
    }
}

pub struct SessionManager {
    slot: Arc<RwLock<Slot>>,
    transition: Mutex<()>,
    loading: Arc<AtomicBool>,
    permits: Arc<Semaphore>,
    pipeline: Arc<Pipeline>,
    loader: Arc<dyn ModelLoader>,
    min_artifact_bytes: u64,
    timeout: Duration,
}

impl SessionManager {
    /// Creates an unloaded session using the loader selected by the enabled features.
    pub fn new(config: &Config) -> Self {
        Self::with_loader(config, engine::default_loader(config))
    }

    pub fn with_loader(config: &Config, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Slot::Unloaded)),
            transition: Mutex::new(()),
            loading: Arc::new(AtomicBool::new(false)),
            permits: Arc::new(Semaphore::new(config.generation.concurrency.max(1))),
            pipeline: Arc::new(Pipeline::new(config.generation.clone())),
            loader,
            min_artifact_bytes: config.model.min_artifact_bytes,
            timeout: config.generation.timeout(),
        }
    }

    /// Overrides the configured generation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn generation_config(&self) -> &GenerationConfig {
        self.pipeline.config()
    }

    /// Loads the model artifact at `path`, replacing any previous model.
    ///
    /// Fails fast with [`LoadError::AlreadyLoading`] while another load is in
    /// flight. A missing artifact leaves the session `Unloaded`; any other
    /// failure leaves it `Failed` until the next load or unload.
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref().to_path_buf();

        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(model = %redact_path(&path), "Rejected load: another load is in progress");
            return Err(LoadError::AlreadyLoading);
        }

        let mut guard = LoadGuard {
            loading: Arc::clone(&self.loading),
            slot: Arc::clone(&self.slot),
            settled: false,
        };
        let _transition = self.transition.lock().await;

        {
            let mut slot = self.slot.write().await;
            let previous = mem::replace(&mut *slot, Slot::Unloaded);
            if let Some(prev_path) = previous.path() {
                log_transition(previous.state(), SessionState::Unloaded, prev_path);
            }
            drop(previous);

            *slot = Slot::Loading { path: path.clone() };
            log_transition(SessionState::Unloaded, SessionState::Loading, &path);
        }

        let loader = Arc::clone(&self.loader);
        let min_bytes = self.min_artifact_bytes;
        let task_path = path.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let info = artifact::inspect(&task_path, min_bytes)?;
            debug!(
                model = %redact_path(&task_path),
                size_bytes = info.size_bytes,
                gguf_version = info.version,
                tensors = info.tensor_count,
                "Model artifact validated"
            );
            let engine = loader.load(&task_path)?;
            Ok::<_, LoadError>(ModelHandle::new(task_path, engine))
        })
        .await;

        let outcome = match outcome {
            Ok(result) => result,
            Err(e) => Err(LoadError::Corrupt {
                path: path.clone(),
                reason: format!("loader task failed: {}", e),
            }),
        };

        let mut slot = self.slot.write().await;
        let result = match outcome {
            Ok(handle) => {
                *slot = Slot::Ready(handle);
                log_transition(SessionState::Loading, SessionState::Ready, &path);
                Ok(())
            }
            Err(LoadError::NotFound(missing)) => {
                *slot = Slot::Unloaded;
                log_transition(SessionState::Loading, SessionState::Unloaded, &path);
                warn!(model = %redact_path(&path), "Model artifact not found");
                Err(LoadError::NotFound(missing))
            }
            Err(error) => {
                warn!(model = %redact_path(&path), "Model load failed: {}", error);
                *slot = Slot::Failed {
                    path: path.clone(),
                    error: error.clone(),
                };
                log_transition(SessionState::Loading, SessionState::Failed, &path);
                Err(error)
            }
        };
        guard.settled = true;

        result
    }

    /// Releases the loaded model, waiting for in-flight loads and generations.
    ///
    /// Idempotent, and also clears a `Failed` session.
    pub async fn unload(&self) -> Result<(), UnloadError> {
        let _transition = self.transition.lock().await;
        let mut slot = self.slot.write().await;

        let previous = mem::replace(&mut *slot, Slot::Unloaded);
        match previous.path() {
            Some(path) => log_transition(previous.state(), SessionState::Unloaded, path),
            None => debug!("Unload requested with no model loaded"),
        }
        drop(previous);

        Ok(())
    }

    /// Reloads the artifact of the current model.
    ///
    /// Returns `Ok(false)` without doing anything when no model is recorded.
    pub async fn reload(&self) -> Result<bool, LoadError> {
        let path = {
            let slot = self.slot.read().await;
            match &*slot {
                Slot::Loading { .. } => return Err(LoadError::AlreadyLoading),
                other => other.path().map(Path::to_path_buf),
            }
        };

        match path {
            Some(path) => {
                self.load(&path).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Generates a commit message for `diff_text` with the loaded model.
    ///
    /// Never fails with a Rust error: validation, a missing model, a timeout
    /// and engine errors are all reported as [`GenerationResult::Failure`].
    pub async fn generate(&self, diff_text: &str) -> GenerationResult {
        let span = info_span!(
            "generate",
            input_chars = diff_text.chars().count(),
            diff = %fingerprint(diff_text)
        );
        self.generate_inner(diff_text).instrument(span).await
    }

    async fn generate_inner(&self, diff_text: &str) -> GenerationResult {
        let lease = Arc::clone(&self.slot).read_owned().await;
        if !matches!(*lease, Slot::Ready(_)) {
            return GenerationResult::failure(
                FailureKind::ModelNotLoaded,
                format!("No model is loaded (session is {})", lease.state()),
            );
        }

        let request = match self.pipeline.prepare(diff_text) {
            Ok(request) => request,
            Err(e) => {
                info!("Rejected generation request: {}", e);
                return e.into();
            }
        };
        let request_id = request.request_id;

        let cancel = Arc::new(AtomicBool::new(false));
        let task_cancel = Arc::clone(&cancel);
        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);

        let work = async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return GenerationResult::failure(
                        FailureKind::Internal,
                        "Generation permits are closed",
                    )
                }
            };

            let task = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                match &*lease {
                    Slot::Ready(handle) => {
                        pipeline.execute_with_cancel(&request, handle, &task_cancel)
                    }
                    other => GenerationResult::failure(
                        FailureKind::ModelNotLoaded,
                        format!("No model is loaded (session is {})", other.state()),
                    ),
                }
            });

            match task.await {
                Ok(result) => result,
                Err(e) => GenerationResult::failure(
                    FailureKind::Internal,
                    format!("Generation task failed: {}", e),
                ),
            }
        };

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => {
                debug!(%request_id, success = result.is_success(), "Generation finished");
                result
            }
            Err(_) => {
                cancel.store(true, Ordering::Release);
                warn!(%request_id, timeout = ?self.timeout, "Generation timed out");
                GenerationResult::failure(
                    FailureKind::Timeout,
                    format!("Generation timed out after {:?}", self.timeout),
                )
            }
        }
    }

    pub async fn state(&self) -> SessionState {
        self.slot.read().await.state()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let slot = self.slot.read().await;
        SessionSnapshot {
            state: slot.state(),
            model_path: slot.path().map(Path::to_path_buf),
            loaded_at: match &*slot {
                Slot::Ready(handle) => Some(handle.loaded_at()),
                _ => None,
            },
            last_error: match &*slot {
                Slot::Failed { error, .. } => Some(error.to_string()),
                _ => None,
            },
        }
    }
}
