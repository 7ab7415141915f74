use heatmap_core::SiteId;
use heatmap_scheduler::ScheduleStore;
use tracing::info;

use crate::error::Result;
use crate::result::ProvisioningResult;

pub const SUCCESS_LOG: &str = "Success all";

/// Human-readable log line for a finished run: `"Success all"` or
/// `"Errors: [40, 12]"`, failed ids in the order they were processed.
pub fn summary(result: &ProvisioningResult) -> String {
    if !result.has_failures() {
        return SUCCESS_LOG.to_string();
    }
    let ids: Vec<String> = result
        .failed_in_run_order()
        .iter()
        .map(SiteId::to_string)
        .collect();
    format!("Errors: [{}]", ids.join(", "))
}

/// Write `result` into schedule record `record_id` and mark it processed.
///
/// The record is marked processed even when some sites failed; the failed
/// subset is stored alongside so it can be retried explicitly.
pub fn record_completion<S>(store: &S, record_id: i64, result: &ProvisioningResult) -> Result<()>
where
    S: ScheduleStore + ?Sized,
{
    let log = summary(result);
    let failed = result.failed_in_run_order();
    store.record_completion(record_id, &log, &failed)?;
    info!(record_id, failed = failed.len(), log = %log, "completion recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::SiteOutcome;

    #[test]
    fn success_summary() {
        let mut result = ProvisioningResult::default();
        result.record(SiteId(1), SiteOutcome::Provisioned);
        assert_eq!(summary(&result), "Success all");
    }

    #[test]
    fn failure_summary_lists_ids_in_order() {
        let mut result = ProvisioningResult::default();
        for id in [40, 12] {
            result.record(SiteId(id), SiteOutcome::Failed { reason: "x".into() });
        }
        assert_eq!(summary(&result), "Errors: [40, 12]");
    }

    #[test]
    fn stored_failures_follow_run_order() {
        use chrono::NaiveDate;
        use heatmap_scheduler::SqliteStore;

        let store = SqliteStore::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 11, 18).unwrap();
        store.upsert(date, &[SiteId(40), SiteId(12)]).unwrap();
        let record = store.find_due(date).unwrap().unwrap();

        let mut result = ProvisioningResult::default();
        for id in [40, 12] {
            result.record(SiteId(id), SiteOutcome::Failed { reason: "x".into() });
        }
        record_completion(&store, record.id, &result).unwrap();

        let record = store.find_due(date).unwrap().unwrap();
        assert_eq!(record.log.as_deref(), Some("Errors: [40, 12]"));
        assert_eq!(record.failed_sites, vec![SiteId(40), SiteId(12)]);
    }
}
