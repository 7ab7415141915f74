use std::collections::HashSet;
use std::num::NonZeroUsize;

use chrono::NaiveDate;
use heatmap_core::calendar::month_start;
use heatmap_core::config::ScheduleAnchor;
use heatmap_core::SiteId;
use serde::Serialize;
use tracing::{info, warn};

use crate::chunk::chunk;
use crate::error::{Result, SchedulerError};
use crate::schedule::Schedule;
use crate::store::{ActiveSiteSource, ScheduleStore};

/// Date the first slot lands on for a run on `today`.
pub fn reference_date(anchor: ScheduleAnchor, today: NaiveDate) -> NaiveDate {
    match anchor {
        ScheduleAnchor::MonthStart => month_start(today),
        ScheduleAnchor::Today => today,
    }
}

/// Spread `sites` over `slots` consecutive days starting at `reference`.
pub fn plan_schedule(sites: &[SiteId], slots: NonZeroUsize, reference: NaiveDate) -> Result<Schedule> {
    let mut seen = HashSet::with_capacity(sites.len());
    if let Some(dup) = sites.iter().find(|id| !seen.insert(**id)) {
        return Err(SchedulerError::DuplicateSite(*dup));
    }
    if sites.is_empty() {
        warn!("no sites to split; every slot will be empty");
    }

    let base = sites.len() / slots.get();
    let extra = sites.len() % slots.get();
    info!(total = sites.len(), slots = slots.get(), base, extra, "splitting sites into slots");

    Schedule::build(chunk(sites, slots), reference)
}

/// Outcome of a distribution run, shaped for the job's JSON response.
#[derive(Debug, Serialize)]
pub struct DistributionReport {
    pub message: String,
    pub total_sites: usize,
    pub days: usize,
    pub schedule: Schedule,
}

impl DistributionReport {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            message: format!("Sites successfully split into {}-day schedule", schedule.days()),
            total_sites: schedule.total_sites(),
            days: schedule.days(),
            schedule,
        }
    }
}

/// Read the active sites, plan the distribution and persist every slot.
///
/// Either all slots are written or none are.
pub fn distribute<S>(store: &S, slots: NonZeroUsize, reference: NaiveDate) -> Result<DistributionReport>
where
    S: ScheduleStore + ActiveSiteSource,
{
    let sites = store.list_active()?;
    let schedule = plan_schedule(&sites, slots, reference)?;
    store.upsert_schedule(&schedule)?;
    info!(
        total = schedule.total_sites(),
        days = schedule.days(),
        first = %reference,
        "distribution completed"
    );
    Ok(DistributionReport::new(schedule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use rusqlite::Connection;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn slots(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn seeded_store(count: i64) -> SqliteStore {
        let store = SqliteStore::new(Connection::open_in_memory().unwrap()).unwrap();
        for id in 1..=count {
            store
                .connection()
                .execute("INSERT INTO heatmap_site (site_id) VALUES (?1)", [id])
                .unwrap();
        }
        store
    }

    #[test]
    fn month_start_anchor() {
        assert_eq!(reference_date(ScheduleAnchor::MonthStart, d(2025, 10, 18)), d(2025, 10, 1));
        assert_eq!(reference_date(ScheduleAnchor::Today, d(2025, 10, 18)), d(2025, 10, 18));
    }

    #[test]
    fn plan_rejects_duplicates() {
        let sites = vec![SiteId(1), SiteId(2), SiteId(1)];
        let err = plan_schedule(&sites, slots(2), d(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateSite(SiteId(1))));
    }

    #[test]
    fn distribute_persists_every_slot() {
        let store = seeded_store(100);
        let report = distribute(&store, slots(21), d(2025, 11, 1)).unwrap();

        assert_eq!(report.total_sites, 100);
        assert_eq!(report.days, 21);
        assert_eq!(report.message, "Sites successfully split into 21-day schedule");

        let first = store.find_due(d(2025, 11, 1)).unwrap().unwrap();
        assert_eq!(first.site_ids.len(), 5);
        assert_eq!(first.site_ids[0], SiteId(1));
        let last = store.find_due(d(2025, 11, 21)).unwrap().unwrap();
        assert_eq!(last.site_ids.len(), 4);
        assert_eq!(last.site_ids.last(), Some(&SiteId(100)));
        assert!(store.find_due(d(2025, 11, 22)).unwrap().is_none());
    }

    #[test]
    fn distribute_with_no_sites_writes_empty_slots() {
        let store = seeded_store(0);
        let report = distribute(&store, slots(3), d(2025, 11, 1)).unwrap();
        assert_eq!(report.total_sites, 0);
        let record = store.find_due(d(2025, 11, 3)).unwrap().unwrap();
        assert!(record.site_ids.is_empty());
    }

    #[test]
    fn failed_distribution_leaves_no_rows() {
        let store = seeded_store(10);
        // Rejecting the third slot's date makes the batch fail mid-way.
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_third BEFORE INSERT ON monthly_adding_site_tables
                 WHEN NEW.apply_on = '2025-11-03'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        assert!(distribute(&store, slots(5), d(2025, 11, 1)).is_err());
        assert!(store.find_due(d(2025, 11, 1)).unwrap().is_none());
        assert!(store.find_due(d(2025, 11, 2)).unwrap().is_none());
    }
}
