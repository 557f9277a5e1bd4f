use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use gitca::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Generate a conventional commit message from a diff with a local model.
///
/// The diff is read from stdin unless `--diff-file` or `--staged` is given.
#[derive(Debug, Parser)]
#[command(name = "git-ca", author, version, about, long_about = None)]
pub struct Cli {
    /// JSON config file (defaults to the per-user config if it exists)
    #[arg(short, long, env = "GITCA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Model artifact to load, overriding the config
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Catalog model id, resolved inside the model cache
    #[arg(long, conflicts_with = "model")]
    pub model_id: Option<String>,

    /// Read the diff from a file
    #[arg(short = 'f', long, conflicts_with = "staged")]
    pub diff_file: Option<PathBuf>,

    /// Use the staged changes (`git diff --cached`)
    #[arg(short, long)]
    pub staged: bool,

    /// Language of the commit message (en, zh)
    #[arg(short, long)]
    pub language: Option<Language>,

    /// Truncate oversized diffs instead of rejecting them
    #[arg(long)]
    pub truncate: bool,

    /// Generation timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// List catalog models and whether they are cached
    #[arg(long, conflicts_with_all = ["download", "diff_file", "staged"])]
    pub list_models: bool,

    /// Download the configured catalog model into the cache and exit
    #[arg(long, conflicts_with_all = ["diff_file", "staged"])]
    pub download: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}
