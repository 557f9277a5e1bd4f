//! Scripted inference engine with observable side effects.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use gitca::engine::{InferenceEngine, ModelLoader};
use gitca::{InferenceError, LoadError};

const POLL: Duration = Duration::from_millis(5);

/// Counters shared between a test and every engine its loader creates.
#[derive(Clone, Default)]
pub struct Probe {
    loads: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
    engines_dropped: Arc<AtomicUsize>,
    dropped_while_active: Arc<AtomicBool>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn engines_dropped(&self) -> usize {
        self.engines_dropped.load(Ordering::SeqCst)
    }

    /// True if an engine was destroyed while an inference was still running on it.
    pub fn dropped_while_active(&self) -> bool {
        self.dropped_while_active.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Polls `cond` until it holds or `timeout` elapses.
    pub async fn wait_for(&self, timeout: Duration, cond: impl Fn(&Probe) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond(self) {
                return true;
            }
            tokio::time::sleep(POLL).await;
        }
        cond(self)
    }
}

/// Loader producing engines that sleep, then answer with a fixed reply.
pub struct ScriptedLoader {
    reply: String,
    load_delay: Duration,
    infer_delay: Duration,
    probe: Probe,
}

impl ScriptedLoader {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            load_delay: Duration::ZERO,
            infer_delay: Duration::ZERO,
            probe: Probe::default(),
        }
    }

    pub fn load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn infer_delay(mut self, delay: Duration) -> Self {
        self.infer_delay = delay;
        self
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl ModelLoader for ScriptedLoader {
    fn load(&self, _path: &Path) -> Result<Box<dyn InferenceEngine>, LoadError> {
        std::thread::sleep(self.load_delay);
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            reply: self.reply.clone(),
            delay: self.infer_delay,
            probe: self.probe.clone(),
        }))
    }
}

struct ScriptedEngine {
    reply: String,
    delay: Duration,
    probe: Probe,
}

impl InferenceEngine for ScriptedEngine {
    fn infer(
        &self,
        prompt: &str,
        _max_tokens: usize,
        cancel: &AtomicBool,
    ) -> Result<String, InferenceError> {
        let probe = &self.probe;
        probe.calls.fetch_add(1, Ordering::SeqCst);
        probe.prompts.lock().unwrap().push(prompt.to_string());
        let now_active = probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        probe.max_active.fetch_max(now_active, Ordering::SeqCst);

        let deadline = Instant::now() + self.delay;
        let outcome = loop {
            if cancel.load(Ordering::Acquire) {
                probe.cancelled.fetch_add(1, Ordering::SeqCst);
                break Err(InferenceError::Timeout);
            }
            if Instant::now() >= deadline {
                break Ok(self.reply.clone());
            }
            std::thread::sleep(POLL);
        };

        probe.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        if self.probe.active() > 0 {
            self.probe.dropped_while_active.store(true, Ordering::SeqCst);
        }
        self.probe.engines_dropped.fetch_add(1, Ordering::SeqCst);
    }
}
