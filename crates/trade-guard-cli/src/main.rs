use std::collections::HashMap;
use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use trade_guard_core::reference::tariff::validate_code;
use trade_guard_core::{
    client_from_settings, load_roster, Declaration, EntityScreener, FileSanctionsStore,
    FileTariffStore, LlmSettings, LlmWorker, Orchestrator, OutputFormat, SanctionsWorker,
    TariffReference, TariffWorker,
};

#[derive(Parser, Debug)]
#[command(
    name = "trade-guard",
    author,
    version,
    about = "Customs declaration compliance CLI"
)]
struct Cli {
    /// Directory containing reference data (sanctions.json, tariff_codes.json)
    #[arg(
        long = "reference-dir",
        value_name = "DIR",
        default_value = "./reference",
        global = true
    )]
    reference_dir: PathBuf,

    /// Optional TOML configuration file overlaying the environment
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a full compliance check over a declaration (JSON file or stdin)
    Check {
        /// Declaration file; reads stdin when omitted
        file: Option<PathBuf>,
        /// Also dispatch model-backed workers from the roster
        #[arg(long)]
        with_llm: bool,
        /// Worker roster file for model-backed workers
        #[arg(long, value_name = "FILE", default_value = "./workers.yaml")]
        workers: PathBuf,
        /// Only count strong sanctions matches (relevance >= 0.8)
        #[arg(long)]
        strict: bool,
        /// Per-worker timeout (e.g. 30s, 2m)
        #[arg(long, value_name = "DURATION", default_value = "30s")]
        worker_timeout: humantime::Duration,
        /// Whole-run timeout
        #[arg(long, value_name = "DURATION", default_value = "2m")]
        timeout: humantime::Duration,
        /// Emit the report as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// Validate one tariff code's format and normalization
    ValidateCode {
        code: String,
        #[arg(long)]
        json: bool,
    },
    /// Screen one entity name against the sanctions list
    Screen {
        name: String,
        /// Country used to boost match relevance
        #[arg(long)]
        country: Option<String>,
        /// Only report strong matches (relevance >= 0.8)
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        json: bool,
    },
    /// List the workers a check would dispatch
    ListWorkers {
        #[arg(long, value_name = "FILE", default_value = "./workers.yaml")]
        workers: PathBuf,
        #[arg(long)]
        with_llm: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match &cli.command {
        Commands::Check {
            file,
            with_llm,
            workers,
            strict,
            worker_timeout,
            timeout,
            json,
        } => {
            check(
                &cli,
                file.as_deref(),
                *with_llm,
                workers,
                *strict,
                worker_timeout.clone().into(),
                timeout.clone().into(),
                *json,
            )
            .await?
        }
        Commands::ValidateCode { code, json } => validate(code, *json)?,
        Commands::Screen {
            name,
            country,
            strict,
            json,
        } => screen(&cli.reference_dir, name, country.as_deref(), *strict, *json).await?,
        Commands::ListWorkers { workers, with_llm } => list_workers(workers, *with_llm)?,
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn check(
    cli: &Cli,
    file: Option<&Path>,
    with_llm: bool,
    workers: &Path,
    strict: bool,
    worker_timeout: Duration,
    timeout: Duration,
    json: bool,
) -> Result<()> {
    let declaration = read_declaration(file)?;

    let sanctions = Arc::new(FileSanctionsStore::new(&cli.reference_dir));
    let tariff = Arc::new(FileTariffStore::new(&cli.reference_dir));
    let mut orchestrator = Orchestrator::new()
        .with_timeouts(worker_timeout, timeout)
        .register(Arc::new(
            SanctionsWorker::new(EntityScreener::new(sanctions)).strict(strict),
        ))
        .register(Arc::new(TariffWorker::new(TariffReference::new(tariff))));

    if with_llm {
        let raw = std::fs::read_to_string(workers)
            .with_context(|| format!("failed to read worker roster {}", workers.display()))?;
        let roster = load_roster(&raw)?;
        let settings = llm_settings(cli.config.as_deref())?;
        let client = client_from_settings(&settings)?;
        for spec in roster {
            orchestrator =
                orchestrator.register(Arc::new(LlmWorker::new(spec, Arc::clone(&client))));
        }
    }

    debug!(
        workers = orchestrator.worker_ids().len(),
        "dispatching compliance check"
    );
    let report = orchestrator.run_compliance_check(&declaration).await?;
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    print!("{}", trade_guard_core::render_report(&report, format)?);
    Ok(())
}

fn read_declaration(file: Option<&Path>) -> Result<Declaration> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read declaration {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read declaration from stdin")?;
            buffer
        }
    };
    serde_json::from_str(&raw).context("declaration is not valid JSON")
}

fn validate(code: &str, json: bool) -> Result<()> {
    let validation = validate_code(code);
    if json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
        return Ok(());
    }
    println!(
        "{}: {}",
        validation.original,
        if validation.is_valid_format {
            "valid"
        } else {
            "invalid"
        }
    );
    println!("normalized: {}", validation.normalized);
    if let Some(components) = &validation.components {
        println!(
            "chapter {} / heading {} / subheading {}",
            components.chapter, components.heading, components.subheading
        );
    }
    for issue in &validation.issues {
        println!("issue: {issue}");
    }
    Ok(())
}

async fn screen(
    reference_dir: &Path,
    name: &str,
    country: Option<&str>,
    strict: bool,
    json: bool,
) -> Result<()> {
    let store = Arc::new(FileSanctionsStore::new(reference_dir));
    let screener = EntityScreener::new(store);
    let result = screener
        .screen(name, country, strict)
        .await
        .context("sanctions screening failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    if !result.matched {
        println!("No matches for \"{name}\"");
        return Ok(());
    }
    println!(
        "{} match(es) for \"{name}\" ({} exact, {} partial)",
        result.matches.len(),
        result.exact_matches,
        result.partial_matches
    );
    for m in &result.matches {
        println!(
            "- {name:<40} [{regime}] relevance {relevance:.2}",
            name = m.entity.name,
            regime = m.entity.regime_code,
            relevance = m.relevance
        );
    }
    Ok(())
}

fn list_workers(workers: &Path, with_llm: bool) -> Result<()> {
    println!("- {:<24} (built-in)", "sanctions-screening");
    println!("- {:<24} (built-in)", "tariff-validation");
    if !with_llm {
        return Ok(());
    }
    let raw = std::fs::read_to_string(workers)
        .with_context(|| format!("failed to read worker roster {}", workers.display()))?;
    for spec in load_roster(&raw)? {
        println!("- {:<24} (model-backed)", spec.id);
    }
    Ok(())
}

/// File configuration for the completion provider, overlaid on the
/// process environment when `--config` is given.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    llm: LlmTable,
}

#[derive(Debug, Default, Deserialize)]
struct LlmTable {
    provider: Option<String>,
    api_key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

fn llm_settings(config_path: Option<&Path>) -> Result<LlmSettings> {
    let mut vars: HashMap<String, String> = env::vars().collect();
    if let Some(path) = config_path {
        let file_config: FileConfig = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?
            .try_deserialize()
            .context("invalid configuration file")?;
        overlay(&mut vars, "TRADE_GUARD_PROVIDER", file_config.llm.provider);
        overlay(&mut vars, "TRADE_GUARD_API_KEY", file_config.llm.api_key);
        overlay(&mut vars, "TRADE_GUARD_ENDPOINT", file_config.llm.endpoint);
        overlay(&mut vars, "TRADE_GUARD_MODEL", file_config.llm.model);
        overlay(
            &mut vars,
            "TRADE_GUARD_TIMEOUT_SECS",
            file_config.llm.timeout_secs.map(|v| v.to_string()),
        );
        overlay(
            &mut vars,
            "TRADE_GUARD_MAX_RETRIES",
            file_config.llm.max_retries.map(|v| v.to_string()),
        );
    }
    LlmSettings::from_vars(vars)
}

fn overlay(vars: &mut HashMap<String, String>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        vars.insert(key.to_string(), value);
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
