//! Commit prompt construction and output normalization.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::Language;

use super::diff::DiffSummary;

/// Conventional commit types accepted in normalized output.
pub const COMMIT_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "test", "chore", "perf", "ci", "build",
];

static RE_CONVENTIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(feat|fix|docs|style|refactor|test|chore|perf|ci|build)(\([^)]*\))?!?:\s*\S")
        .unwrap()
});

/// Sanitizes text for safe inclusion in LLM prompts.
///
/// Escapes ChatML tokens (`<|...|>`) and common instruction tokens so that a
/// diff cannot close the user turn or open a new system turn.
///
/// # Sequences Escaped
/// - `<|...|>` - ChatML special tokens (system, user, assistant markers)
/// - `<s>`, `</s>` - Sequence boundaries
/// - `[INST]`, `[/INST]` - Llama-style instruction markers
/// - `<<SYS>>`, `<</SYS>>` - Llama-style system prompt markers
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}

const SYSTEM_EN: &str = "You are a commit message generator. Write a single conventional commit message.

RULES:
- Format: type(scope): subject
- Types: feat, fix, docs, style, refactor, test, chore, perf, ci, build
- Choose only ONE type that best represents the primary purpose of the changes
- Scope is optional, derived from the primary module changed
- Subject: imperative mood, no period, under 72 characters
- Do not mention issue numbers
- Output ONLY the commit message, in English, without explanations or markdown";

const SYSTEM_ZH: &str = "你是一个提交信息生成器。请写出一条遵循约定式提交格式的提交信息。

规则：
- 格式：类型(范围): 主题
- 类型：feat, fix, docs, style, refactor, test, chore, perf, ci, build
- 只选择一个最能代表变更主要目的的类型
- 范围可选，表示受影响的模块
- 主题使用祈使语气，不超过 72 个字符，结尾不加句号
- 不要提及问题编号
- 只输出提交信息，主题必须使用简体中文（类型关键字除外），不要有任何额外解释或 markdown";

/// Builds a ChatML prompt for commit message generation.
pub fn build_commit_prompt(diff: &str, summary: &DiffSummary, language: Language) -> String {
    let system = match language {
        Language::En => SYSTEM_EN,
        Language::Zh => SYSTEM_ZH,
    };

    let files_section = if summary.files.is_empty() {
        String::new()
    } else {
        let files_text = summary
            .files
            .iter()
            .map(|f| format!("  {} {}", f.kind.code(), sanitize_for_prompt(&f.path)))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Changed files (+{} -{}):\n{}\n\n",
            summary.insertions, summary.deletions, files_text
        )
    };

    format!(
        "<|im_start|>system\n{system}<|im_end|>\n<|im_start|>user\n{files}Diff:\n{diff}\n<|im_end|>\n<|im_start|>assistant\n",
        system = system,
        files = files_section,
        diff = sanitize_for_prompt(diff.trim_end()),
    )
}

/// Reduces raw model output to one conventional commit line.
///
/// Returns `None` when the output holds no usable text.
pub fn normalize_commit_message(response: &str, max_subject_chars: usize) -> Option<String> {
    let first_line = response
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))?
        .trim_matches(|c| c == '"' || c == '`' || c == '\'')
        .trim();

    if first_line.is_empty() {
        return None;
    }

    let message: String = if RE_CONVENTIONAL.is_match(first_line) {
        first_line.chars().take(max_subject_chars).collect()
    } else {
        const PREFIX: &str = "chore: ";
        let budget = max_subject_chars.saturating_sub(PREFIX.len());
        let desc: String = first_line.chars().take(budget).collect();
        format!("{}{}", PREFIX, desc.trim_end())
            .chars()
            .take(max_subject_chars)
            .collect()
    };

    let message = message.trim_end();
    if message.is_empty() {
        return None;
    }

    Some(message.to_string())
}
