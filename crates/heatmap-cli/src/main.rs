mod output;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use heatmap_core::calendar::today_at_offset;
use heatmap_core::config::{HeatmapConfig, SecretSourceKind, SecretsConfig};
use heatmap_core::secret::{EnvSecretSource, FileSecretSource, SecretSource};
use heatmap_provisioner::{run_provisioning, RunMode, RunOptions, SqliteSiteTables, TableProvisioner};
use heatmap_scheduler::distribute::{distribute, plan_schedule, reference_date, DistributionReport};
use heatmap_scheduler::{db, ActiveSiteSource, SqliteStore};
use tracing::{error, info, info_span, warn};

#[derive(Parser)]
#[command(
    name = "heatmap",
    about = "Spread heatmap sites over monthly slots and create their monthly tables",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ~/.heatmap/heatmap.toml)
    #[arg(long, global = true, env = "HEATMAP_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split active sites into daily slots and store one record per day
    Distribute {
        /// Run as if today were this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Number of slots (default: schedule.slots)
        #[arg(long)]
        slots: Option<usize>,
    },

    /// Compute the distribution without storing it
    Plan {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        slots: Option<usize>,
        /// Directory to write schedule_output.json and schedule_summary.json into
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Create next month's tables for the sites scheduled on a date
    Provision {
        /// Record date to consume (default: today in schedule.utc_offset_hours)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Run even if the record is already processed
        #[arg(long)]
        force: bool,
    },

    /// Re-run provisioning for the sites that failed on a date
    RetryFailed {
        #[arg(long)]
        date: NaiveDate,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "heatmap=info".into()),
        )
        // stdout is reserved for the command's report
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = HeatmapConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Distribute { date, slots } => distribute_cmd(&config, date, slots),
        Command::Plan { date, slots, out } => plan_cmd(&config, date, slots, out.as_deref()),
        Command::Provision { date, force } => {
            let today = run_date(&config, date)?;
            provision_cmd(&config, today, RunMode::Due { force })
        }
        Command::RetryFailed { date } => provision_cmd(&config, date, RunMode::RetryFailed),
    }
}

/// Run one named step, logging its start and end.
fn run_step<T>(name: &str, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    let span = info_span!("step", step = name);
    let _guard = span.enter();

    info!("====== START STEP: {name} ======");
    match f() {
        Ok(value) => {
            info!("====== DONE STEP: {name} ======");
            Ok(value)
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "====== ERROR STEP: {name} ======");
            Err(e)
        }
    }
}

fn distribute_cmd(config: &HeatmapConfig, date: Option<NaiveDate>, slots: Option<usize>) -> anyhow::Result<()> {
    let today = run_date(config, date)?;
    let slots = slot_count(config, slots)?;
    let reference = reference_date(config.schedule.anchor, today);

    let store = run_step("Connect to database", || open_store(config))?;
    let report = run_step("Distribute sites", || Ok(distribute(&store, slots, reference)?))?;

    output::print_json(&output::DistributeView::new(&report))
}

fn plan_cmd(
    config: &HeatmapConfig,
    date: Option<NaiveDate>,
    slots: Option<usize>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let today = run_date(config, date)?;
    let slots = slot_count(config, slots)?;
    let reference = reference_date(config.schedule.anchor, today);

    let store = run_step("Connect to database", || open_store(config))?;
    let sites = run_step("List active sites", || Ok(store.list_active()?))?;
    let schedule = run_step("Split sites", || Ok(plan_schedule(&sites, slots, reference)?))?;
    let report = DistributionReport::new(schedule);

    println!("{}", report.message);
    output::print_table(&output::SUMMARY_HEADERS, &output::summary_rows(&report.schedule));

    if let Some(dir) = out {
        let (full, summary) = run_step("Write schedule files", || output::write_schedule_files(dir, &report))?;
        info!(full = %full.display(), summary = %summary.display(), "schedule files written");
    }
    Ok(())
}

fn provision_cmd(config: &HeatmapConfig, today: NaiveDate, mode: RunMode) -> anyhow::Result<()> {
    let store = run_step("Connect to database", || open_store(config))?;
    let mut provisioner = run_step("Open template database", || open_provisioner(config))?;

    let opts = RunOptions {
        today,
        lead_months: config.provision.lead_months,
        mode,
    };
    let report = run_step("Create monthly tables", || {
        Ok(run_provisioning(&store, &mut provisioner, opts)?)
    })?;

    if report.result.has_failures() {
        warn!(
            failed = ?report.result.failed_in_run_order(),
            "some sites failed; rerun with `heatmap retry-failed --date {today}`"
        );
    }
    output::print_json(&report)
}

/// `date` if given, else today in the configured UTC offset.
fn run_date(config: &HeatmapConfig, date: Option<NaiveDate>) -> anyhow::Result<NaiveDate> {
    match date {
        Some(date) => Ok(date),
        None => Ok(today_at_offset(config.schedule.utc_offset_hours)?),
    }
}

fn slot_count(config: &HeatmapConfig, slots: Option<usize>) -> anyhow::Result<NonZeroUsize> {
    NonZeroUsize::new(slots.unwrap_or(config.schedule.slots)).context("--slots must be at least 1")
}

fn secret_source(secrets: &SecretsConfig) -> Box<dyn SecretSource> {
    match secrets.source {
        SecretSourceKind::Env => Box::new(EnvSecretSource::from_env()),
        SecretSourceKind::File => Box::new(FileSecretSource::new(&secrets.dir)),
    }
}

fn open_store(config: &HeatmapConfig) -> anyhow::Result<SqliteStore> {
    let secret = secret_source(&config.secrets)
        .get(&config.secrets.name)
        .with_context(|| format!("fetching secret {}", config.secrets.name))?;
    let path = secret.database_path(&config.database.path);
    ensure_parent_dir(path)?;

    let conn = db::open(path, Duration::from_secs(config.database.busy_timeout_secs))?;
    let store = SqliteStore::new(conn)?;
    info!("database migrations complete");
    Ok(store)
}

fn open_provisioner(config: &HeatmapConfig) -> anyhow::Result<TableProvisioner<SqliteSiteTables>> {
    let tables = SqliteSiteTables::open(
        Path::new(&config.provision.template_db),
        Path::new(&config.provision.sites_dir),
        Duration::from_secs(config.database.busy_timeout_secs),
    )?;
    Ok(TableProvisioner::new(tables))
}

fn ensure_parent_dir(path: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_retry_failed_date() {
        let cli = Cli::try_parse_from(["heatmap", "retry-failed", "--date", "2025-11-18"]).unwrap();
        match cli.command {
            Command::RetryFailed { date } => assert_eq!(date, NaiveDate::from_ymd_opt(2025, 11, 18).unwrap()),
            _ => panic!("expected retry-failed"),
        }
    }

    #[test]
    fn retry_failed_requires_a_date() {
        assert!(Cli::try_parse_from(["heatmap", "retry-failed"]).is_err());
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(Cli::try_parse_from(["heatmap", "provision", "--date", "2025-13-01"]).is_err());
    }

    #[test]
    fn zero_slots_is_rejected() {
        let config = HeatmapConfig::default();
        assert!(slot_count(&config, Some(0)).is_err());
        assert_eq!(slot_count(&config, None).unwrap().get(), config.schedule.slots);
    }

    #[test]
    fn explicit_date_wins() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(run_date(&HeatmapConfig::default(), Some(date)).unwrap(), date);
    }

    #[test]
    fn run_step_passes_errors_through() {
        let err = run_step("failing", || -> anyhow::Result<()> { anyhow::bail!("boom") }).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(run_step("ok", || Ok(3)).unwrap(), 3);
    }
}
