//! Deterministic commit message engine (fallback when the "ai" feature is disabled).
//!
//! Reads the file headers out of the diff embedded in the prompt and derives a
//! conventional commit line from the kinds and locations of the changes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::error::{InferenceError, LoadError};
use crate::pipeline::diff::{self, ChangeKind, ChangedFile};

use super::{InferenceEngine, ModelLoader};

const FALLBACK_MESSAGE: &str = "chore: update files";

/// Loader that accepts any validated artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicLoader;

impl ModelLoader for HeuristicLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn InferenceEngine>, LoadError> {
        debug!("Using heuristic engine for {}", path.display());
        Ok(Box::new(HeuristicEngine))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicEngine;

impl InferenceEngine for HeuristicEngine {
    fn infer(
        &self,
        prompt: &str,
        _max_tokens: usize,
        cancel: &AtomicBool,
    ) -> Result<String, InferenceError> {
        if cancel.load(Ordering::Acquire) {
            return Err(InferenceError::Timeout);
        }

        let summary = diff::summarize(prompt);
        if summary.files.is_empty() {
            return Ok(FALLBACK_MESSAGE.to_string());
        }

        let commit_type = commit_type(&summary.files);
        let scope = scope(&summary.files)
            .map(|s| format!("({})", s))
            .unwrap_or_default();

        Ok(format!(
            "{}{}: {} {}",
            commit_type,
            scope,
            verb(&summary.files),
            describe(&summary.files)
        ))
    }
}

fn is_doc(path: &str) -> bool {
    path.ends_with(".md") || path.starts_with("docs/")
}

fn is_test(path: &str) -> bool {
    path.starts_with("tests/") || path.contains("/tests/") || path.ends_with("_test.rs")
}

fn commit_type(files: &[ChangedFile]) -> &'static str {
    let all = |pred: fn(&ChangedFile) -> bool| files.iter().all(pred);
    let any = |kind: ChangeKind| files.iter().any(|f| f.kind == kind);

    if all(|f| is_doc(&f.path)) {
        "docs"
    } else if all(|f| is_test(&f.path)) {
        "test"
    } else if all(|f| f.kind == ChangeKind::Renamed) {
        "refactor"
    } else if any(ChangeKind::Added) && !any(ChangeKind::Deleted) {
        "feat"
    } else {
        "chore"
    }
}

fn verb(files: &[ChangedFile]) -> &'static str {
    let first = files[0].kind;
    if files.iter().any(|f| f.kind != first) {
        return "update";
    }
    match first {
        ChangeKind::Added => "add",
        ChangeKind::Deleted => "remove",
        ChangeKind::Renamed => "rename",
        ChangeKind::Modified => "update",
    }
}

/// Deepest directory shared by every file. `src`, `docs` and `tests` are
/// skipped: the first says nothing and the others repeat the commit type.
fn scope(files: &[ChangedFile]) -> Option<String> {
    let mut common: Option<Vec<&str>> = None;

    for file in files {
        let mut dirs: Vec<&str> = file.path.split('/').collect();
        dirs.pop();

        common = Some(match common {
            None => dirs,
            Some(prev) => prev
                .into_iter()
                .zip(dirs)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }

    common?
        .into_iter()
        .rev()
        .find(|dir| !dir.is_empty() && !matches!(*dir, "src" | "docs" | "tests"))
        .map(str::to_string)
}

fn describe(files: &[ChangedFile]) -> String {
    let names: Vec<&str> = files
        .iter()
        .map(|f| f.path.rsplit('/').next().unwrap_or(f.path.as_str()))
        .collect();

    if names.len() <= 3 {
        names.join(", ")
    } else {
        format!("{} and {} more", names[..3].join(", "), names.len() - 3)
    }
}
