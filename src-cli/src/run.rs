//! Command execution: config assembly, model resolution and generation.

use std::path::PathBuf;
use std::process::ExitCode;

use log::{debug, info};

use gitca::config::{apply_env_overrides, default_config_path, load_config, validate_config};
use gitca::engine::store::CatalogEntry;
use gitca::{Config, GenerationResult, ModelStore, OversizePolicy, SessionManager};

use crate::cli::Cli;
use crate::diff_source::DiffSource;
use crate::error::CliError;

#[derive(Debug)]
pub enum Outcome {
    Listed(Vec<ModelListing>),
    Downloaded(PathBuf),
    Generated(GenerationResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelListing {
    pub id: &'static str,
    pub name: String,
    pub approx_size_mb: u64,
    pub cached: bool,
    pub selected: bool,
}

/// Layers config file, environment and command line flags, then re-validates.
pub fn build_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => match default_config_path().filter(|p| p.is_file()) {
            Some(path) => {
                debug!("Using config file: {}", path.display());
                load_config(&path)?
            }
            None => Config::default(),
        },
    };

    apply_env_overrides(&mut config);

    if let Some(model) = &cli.model {
        config.model.path = Some(model.to_string_lossy().into_owned());
    }
    if let Some(id) = &cli.model_id {
        config.model.id = id.clone();
        config.model.path = None;
    }
    if let Some(language) = cli.language {
        config.generation.language = language;
    }
    if cli.truncate {
        config.generation.oversize_policy = OversizePolicy::Truncate;
    }
    if let Some(timeout) = cli.timeout {
        config.generation.timeout_secs = timeout;
    }

    validate_config(&config)?;
    Ok(config)
}

fn listing(entry: &'static CatalogEntry, cached: bool, config: &Config) -> ModelListing {
    ModelListing {
        id: entry.id,
        name: ModelStore::model_name(entry.id).unwrap_or_else(|| entry.id.to_string()),
        approx_size_mb: entry.approx_size_mb,
        cached,
        selected: config.model.path.is_none() && entry.id.eq_ignore_ascii_case(&config.model.id),
    }
}

pub async fn run(cli: &Cli) -> Result<Outcome, CliError> {
    let config = build_config(cli)?;
    let store = ModelStore::from_config(&config.model);

    if cli.list_models {
        let models = store
            .list()
            .into_iter()
            .map(|(entry, cached)| listing(entry, cached, &config))
            .collect();
        return Ok(Outcome::Listed(models));
    }

    if cli.download {
        let path = store.ensure(&config.model.id)?;
        info!("Model available at {}", path.display());
        return Ok(Outcome::Downloaded(path));
    }

    let model_path = store.resolve(&config.model)?;
    let diff = DiffSource::from_cli(cli).read().await?;

    let session = SessionManager::new(&config);
    session.load(&model_path).await?;

    let result = session.generate(&diff).await;

    if let Err(e) = session.unload().await {
        match e {}
    }

    Ok(Outcome::Generated(result))
}

/// Prints the outcome and picks the exit code.
pub fn report(outcome: &Outcome, json: bool) -> ExitCode {
    match outcome {
        Outcome::Listed(models) if json => {
            let value: Vec<_> = models
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "id": m.id,
                        "name": m.name,
                        "approx_size_mb": m.approx_size_mb,
                        "cached": m.cached,
                        "selected": m.selected,
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(value));
            ExitCode::SUCCESS
        }
        Outcome::Listed(models) => {
            for m in models {
                let marker = if m.selected { '*' } else { ' ' };
                let cached = if m.cached { "cached" } else { "" };
                println!(
                    "{} {:<28} {:<32} ~{:>5} MB  {}",
                    marker, m.id, m.name, m.approx_size_mb, cached
                );
            }
            ExitCode::SUCCESS
        }
        Outcome::Downloaded(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Outcome::Generated(result) => {
            if json {
                match serde_json::to_string(result) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        eprintln!("git-ca: failed to serialize result: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                match result {
                    GenerationResult::Success(message) => println!("{}", message),
                    GenerationResult::Failure { .. } => eprintln!("git-ca: {}", result),
                }
            }

            if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
