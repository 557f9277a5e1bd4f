//! Generation request pipeline: validate a diff, prompt the model, normalize the answer.

pub mod diff;
pub mod prompt;
pub mod request;
pub mod result;

use std::sync::atomic::AtomicBool;

use log::{debug, warn};
use tracing::info_span;

use crate::config::{GenerationConfig, OversizePolicy};
use crate::error::ValidationError;
use crate::session::ModelHandle;

pub use diff::{summarize, ChangeKind, ChangedFile, DiffSummary};
pub use prompt::{build_commit_prompt, normalize_commit_message, sanitize_for_prompt};
pub use request::GenerationRequest;
pub use result::{FailureKind, GenerationResult};

pub struct Pipeline {
    config: GenerationConfig,
}

impl Pipeline {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Validates raw diff text against the input bounds.
    ///
    /// Oversized input is rejected unless the policy is `Truncate`, in which
    /// case the first `max_input_chars` characters are kept and the request
    /// is marked `truncated`.
    pub fn prepare(&self, raw_diff: &str) -> Result<GenerationRequest, ValidationError> {
        let _span = info_span!("prepare").entered();

        if raw_diff.trim().is_empty() {
            return Err(ValidationError::Empty);
        }

        let max = self.config.max_input_chars;
        let cut = raw_diff.char_indices().nth(max).map(|(idx, _)| idx);

        match (cut, self.config.oversize_policy) {
            (None, _) => Ok(GenerationRequest::new(raw_diff)),
            (Some(_), OversizePolicy::Reject) => Err(ValidationError::TooLong {
                len: raw_diff.chars().count(),
                max,
            }),
            (Some(idx), OversizePolicy::Truncate) => {
                warn!(
                    "Diff truncated from {} to {} characters",
                    raw_diff.chars().count(),
                    max
                );
                Ok(GenerationRequest::new(&raw_diff[..idx]).truncated(true))
            }
        }
    }

    /// Runs a prepared request against a loaded model.
    pub fn execute(&self, request: &GenerationRequest, handle: &ModelHandle) -> GenerationResult {
        self.execute_with_cancel(request, handle, &AtomicBool::new(false))
    }

    pub fn execute_with_cancel(
        &self,
        request: &GenerationRequest,
        handle: &ModelHandle,
        cancel: &AtomicBool,
    ) -> GenerationResult {
        let _span = info_span!("execute", request_id = %request.request_id).entered();

        let summary = diff::summarize(&request.diff_text);
        let prompt = build_commit_prompt(&request.diff_text, &summary, self.config.language);
        debug!(
            "Prompt built: {} files, {} chars",
            summary.files.len(),
            prompt.len()
        );

        let raw = match handle.run_with_cancel(&prompt, self.config.max_output_chars, cancel) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Inference failed for request {}: {}", request.request_id, e);
                return e.into();
            }
        };
        debug!("Model response:\n{}", raw);

        let limit = self
            .config
            .max_subject_chars
            .min(self.config.max_output_chars);
        match normalize_commit_message(&raw, limit) {
            Some(message) => GenerationResult::Success(message),
            None => GenerationResult::failure(
                FailureKind::Internal,
                "Model returned an empty commit message",
            ),
        }
    }
}
