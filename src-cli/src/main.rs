mod cli;
mod diff_source;
mod error;
mod logging;
mod run;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.log_format) {
        eprintln!("git-ca: {}", e);
        return ExitCode::from(e.exit_code());
    }

    match run::run(&cli).await {
        Ok(outcome) => run::report(&outcome, cli.json),
        Err(e) => {
            tracing::error!(error = %e, "git-ca failed");
            eprintln!("git-ca: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
