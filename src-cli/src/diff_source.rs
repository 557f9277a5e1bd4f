//! Where the diff comes from: stdin, a file, or the git index.

use std::path::PathBuf;
use std::process::Stdio;

use log::debug;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;

use crate::cli::Cli;
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSource {
    Stdin,
    File(PathBuf),
    Staged,
}

impl DiffSource {
    pub fn from_cli(cli: &Cli) -> Self {
        match (&cli.diff_file, cli.staged) {
            (Some(path), _) => Self::File(path.clone()),
            (None, true) => Self::Staged,
            (None, false) => Self::Stdin,
        }
    }

    pub async fn read(&self) -> Result<String, CliError> {
        match self {
            Self::Stdin => {
                let mut diff = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut diff)
                    .await
                    .map_err(CliError::ReadStdin)?;
                Ok(diff)
            }
            Self::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| CliError::ReadDiffFile {
                        path: path.clone(),
                        source: e,
                    })
            }
            Self::Staged => staged_diff().await,
        }
    }
}

async fn staged_diff() -> Result<String, CliError> {
    let mut cmd = TokioCommand::new("git");
    cmd.args(["diff", "--cached", "--no-color", "--no-ext-diff"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = cmd
        .output()
        .await
        .map_err(|e| CliError::Git(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CliError::Git(stderr.trim().to_string()));
    }

    let diff = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!("Read {} bytes of staged diff", diff.len());
    Ok(diff)
}
