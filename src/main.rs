use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use dedup_core::{
    AuditLog, ConfigFile, DedupConfig, DedupEngine, FixedIntervalThrottle, JsonRosterSource,
    LiveMutator, Mutator, NoopMutator, ReportFile, RunReport, Throttle, load_config_file,
};
use emr_client::{EmrClient, EmrError, HttpEmrClient};

const DEFAULT_LOG_DIRECTIVES: &str = "dedup_run=info,dedup_core=info,emr_client=info";

#[derive(Parser)]
#[command(name = "dedup-run")]
#[command(about = "Find duplicate patient records in the EMR and retire all but one")]
struct Cli {
    /// Deactivate retirement candidates in the EMR. Without this flag the run is a dry run.
    #[arg(long)]
    execute: bool,
    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Roster export (JSON array)
    #[arg(long, value_name = "FILE")]
    roster: Option<PathBuf>,
    /// Safety policy: active-only, group-aware or strict-no-groups
    #[arg(long, value_name = "NAME")]
    policy: Option<String>,
    /// Report output path, overwritten on each run
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
    /// Append-only audit log path
    #[arg(long, value_name = "FILE")]
    audit_log: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> ConfigFile {
        ConfigFile {
            policy: self.policy.clone(),
            roster_path: self.roster.clone(),
            report_path: self.report.clone(),
            audit_log_path: self.audit_log.clone(),
            ..Default::default()
        }
    }
}

/// Entry point for a duplicate merge run.
///
/// Setup failures (configuration, credentials, roster, audit log, report path) exit non-zero before
/// any cluster is processed. Per-record failures are reported and the process still exits 0.
///
/// # Environment Variables
/// - `EMR_API_URL`: base URL of the EMR API
/// - `EMR_API_KEY`: API key for the EMR
/// - `RUST_LOG`: log filter (default: engine crates at `info`)
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_DIRECTIVES))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Arc::new(resolve_config(&cli)?);

    let base_url = required_env("EMR_API_URL")?;
    let api_key = required_env("EMR_API_KEY")?;
    let emr = HttpEmrClient::new(&base_url, &api_key)?;
    tracing::info!("++ Using EMR at {}", emr.base_url());

    let throttle = FixedIntervalThrottle::new(
        config.call_delay(),
        config.batch_pause(),
        config.batch_size(),
    );
    let report = run_engine(&config, &emr, &throttle, cli.execute)?;

    if report.is_untrustworthy() {
        tracing::warn!(
            "{} of {} enrichment lookups failed; treat this run as untrustworthy",
            report.enrichment_failures,
            report.enriched_records
        );
    }

    Ok(())
}

/// Open the run's outputs, then run the engine and write the report.
///
/// The audit log and report file are both opened before the roster is read, so an unwritable path
/// never surfaces after records have been deactivated.
fn run_engine(
    config: &Arc<DedupConfig>,
    emr: &dyn EmrClient,
    throttle: &dyn Throttle,
    execute: bool,
) -> anyhow::Result<RunReport> {
    let roster = JsonRosterSource::new(config.roster_path());
    let mut audit = AuditLog::open(config.audit_log_path()).with_context(|| {
        format!("cannot open audit log {}", config.audit_log_path().display())
    })?;
    let report_file = ReportFile::create(config.report_path())
        .with_context(|| format!("cannot create report {}", config.report_path().display()))?;

    let live_mutator;
    let mutator: &dyn Mutator = if execute {
        live_mutator = LiveMutator::new(emr, throttle);
        &live_mutator
    } else {
        &NoopMutator
    };
    tracing::info!("++ Running in {} mode", mutator.mode());

    let engine = DedupEngine::new(Arc::clone(config), emr, throttle);
    let report = engine.run(&roster, mutator, &mut audit)?;
    report_file.write(&report)?;
    Ok(report)
}

fn resolve_config(cli: &Cli) -> anyhow::Result<DedupConfig> {
    let file = match &cli.config {
        Some(path) => load_config_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => ConfigFile::default(),
    };
    Ok(DedupConfig::resolve(file.overlay(cli.overrides()))?)
}

fn required_env(name: &str) -> Result<String, EmrError> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| EmrError::MissingCredentials(format!("{} is not set", name)))
}
