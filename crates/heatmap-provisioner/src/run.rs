use std::collections::HashSet;
use std::time::Instant;

use chrono::NaiveDate;
use heatmap_core::{SiteId, TargetMonth};
use heatmap_scheduler::{ActiveSiteSource, ScheduleStore};
use serde::Serialize;
use tracing::{info, warn};

use crate::audit;
use crate::error::Result;
use crate::provisioner::TableProvisioner;
use crate::result::ProvisioningResult;
use crate::tables::SiteTables;

/// Which site list of the due record a run works through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Every site scheduled for the date. Skipped if the record is processed,
    /// unless forced.
    Due { force: bool },
    /// Only the sites that failed in the last completed run.
    RetryFailed,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Date whose schedule record is consumed.
    pub today: NaiveDate,
    pub lead_months: u32,
    pub mode: RunMode,
}

/// Response body of a provisioning run.
#[derive(Debug, Serialize)]
pub struct ProvisionReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_month: Option<String>,
    pub result: ProvisioningResult,
    /// Seconds spent in the run.
    pub execute_time: f64,
}

impl ProvisionReport {
    fn noop(message: &str, record_id: Option<i64>) -> Self {
        Self {
            message: message.to_string(),
            record_id,
            target_month: None,
            result: ProvisioningResult::default(),
            execute_time: 0.0,
        }
    }

    pub fn did_work(&self) -> bool {
        self.target_month.is_some()
    }
}

/// Consume the schedule record due on `opts.today`.
///
/// No record, an already processed record, or an empty retry list is a no-op
/// report, not an error. Per-site failures end up in the report and in the
/// record's log; only store and calendar errors are returned.
pub fn run_provisioning<S, T>(
    store: &S,
    provisioner: &mut TableProvisioner<T>,
    opts: RunOptions,
) -> Result<ProvisionReport>
where
    S: ScheduleStore + ActiveSiteSource,
    T: SiteTables,
{
    let started = Instant::now();

    let Some(record) = store.find_due(opts.today)? else {
        warn!(apply_on = %opts.today, "no record to process");
        return Ok(ProvisionReport::noop("No record to process", None));
    };

    let site_list: Vec<SiteId> = match opts.mode {
        RunMode::Due { force } => {
            if record.processed && !force {
                info!(record_id = record.id, log = ?record.log, "record already processed");
                return Ok(ProvisionReport::noop("Already processed", Some(record.id)));
            }
            record.site_ids
        }
        RunMode::RetryFailed => {
            if record.failed_sites.is_empty() {
                info!(record_id = record.id, "no failed sites to retry");
                return Ok(ProvisionReport::noop("No failed sites to retry", Some(record.id)));
            }
            record.failed_sites
        }
    };

    // Read fresh on every run; a site deactivated since distribution must be skipped.
    let active: HashSet<SiteId> = store.list_active()?.into_iter().collect();
    let month = TargetMonth::from_date(opts.today, opts.lead_months)?;

    let result = provisioner.provision(&site_list, &active, month);
    audit::record_completion(store, record.id, &result)?;

    let execute_time = started.elapsed().as_secs_f64();
    info!(
        record_id = record.id,
        success = result.success_count,
        failed = result.failure_count,
        execute_time,
        "provisioning completed"
    );

    Ok(ProvisionReport {
        message: "Monthly tables created successfully".to_string(),
        record_id: Some(record.id),
        target_month: Some(month.stamp()),
        result,
        execute_time,
    })
}
