use chrono::{NaiveDate, Utc};
use heatmap_core::SiteId;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::schedule::Schedule;

/// A persisted schedule row: the sites due on one `apply_on` date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRecord {
    pub id: i64,
    pub apply_on: NaiveDate,
    pub site_ids: Vec<SiteId>,
    /// Set once a provisioning run has completed for this date.
    pub processed: bool,
    pub log: Option<String>,
    /// Sites that failed in the last completed run.
    pub failed_sites: Vec<SiteId>,
}

/// Persistence for per-day site lists.
pub trait ScheduleStore {
    /// Insert or overwrite the site list for `apply_on`; `processed` is kept.
    /// A changed site list clears the stored failed subset.
    fn upsert(&self, apply_on: NaiveDate, site_ids: &[SiteId]) -> Result<()>;

    /// Upsert every slot of `schedule` in one transaction. Returns rows written.
    fn upsert_schedule(&self, schedule: &Schedule) -> Result<usize>;

    /// Record due on exactly `apply_on`, or `None` when nothing was scheduled.
    fn find_due(&self, apply_on: NaiveDate) -> Result<Option<ScheduleRecord>>;

    /// Store the run log and failed subset, and mark the record processed.
    fn record_completion(&self, id: i64, log: &str, failed_sites: &[SiteId]) -> Result<()>;
}

/// Source of the live site universe.
pub trait ActiveSiteSource {
    /// Active, non-deleted sites in ascending id order.
    fn list_active(&self) -> Result<Vec<SiteId>>;
}

/// SQLite-backed [`ScheduleStore`] and [`ActiveSiteSource`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Wrap `conn`, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn upsert_row(conn: &Connection, apply_on: NaiveDate, site_ids: &[SiteId]) -> Result<()> {
    let list_sites = serde_json::to_string(site_ids)?;
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO monthly_adding_site_tables (apply_on, list_sites, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(apply_on) DO UPDATE SET
             failed_sites = CASE WHEN list_sites = excluded.list_sites
                                 THEN failed_sites ELSE '[]' END,
             list_sites = excluded.list_sites,
             updated_at = excluded.updated_at",
        params![format_date(apply_on), list_sites, now],
    )?;
    Ok(())
}

fn decode_sites(id: i64, column: &str, raw: &str) -> Result<Vec<SiteId>> {
    serde_json::from_str(raw).map_err(|e| SchedulerError::CorruptRecord {
        id,
        reason: format!("{column}: {e}"),
    })
}

impl ScheduleStore for SqliteStore {
    fn upsert(&self, apply_on: NaiveDate, site_ids: &[SiteId]) -> Result<()> {
        upsert_row(&self.conn, apply_on, site_ids)?;
        debug!(apply_on = %apply_on, sites = site_ids.len(), "schedule row upserted");
        Ok(())
    }

    fn upsert_schedule(&self, schedule: &Schedule) -> Result<usize> {
        // Dropping `tx` on an early return rolls every slot back.
        let tx = self.conn.unchecked_transaction()?;
        for entry in &schedule.entries {
            upsert_row(&tx, entry.date, &entry.sites)?;
        }
        tx.commit()?;
        info!(rows = schedule.days(), "schedule persisted");
        Ok(schedule.days())
    }

    fn find_due(&self, apply_on: NaiveDate) -> Result<Option<ScheduleRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, list_sites, is_added, log, failed_sites
                 FROM monthly_adding_site_tables
                 WHERE apply_on = ?1 LIMIT 1",
                [format_date(apply_on)],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,            // id
                        row.get::<_, String>(1)?,         // list_sites JSON
                        row.get::<_, bool>(2)?,           // is_added
                        row.get::<_, Option<String>>(3)?, // log
                        row.get::<_, String>(4)?,         // failed_sites JSON
                    ))
                },
            )
            .optional()?;

        let Some((id, list_sites, processed, log, failed_sites)) = row else {
            warn!(apply_on = %apply_on, "no schedule record found");
            return Ok(None);
        };

        info!(record_id = id, apply_on = %apply_on, processed, "found schedule record");
        Ok(Some(ScheduleRecord {
            id,
            apply_on,
            site_ids: decode_sites(id, "list_sites", &list_sites)?,
            processed,
            log,
            failed_sites: decode_sites(id, "failed_sites", &failed_sites)?,
        }))
    }

    fn record_completion(&self, id: i64, log: &str, failed_sites: &[SiteId]) -> Result<()> {
        let failed = serde_json::to_string(failed_sites)?;
        let now = Utc::now().to_rfc3339();
        let n = self.conn.execute(
            "UPDATE monthly_adding_site_tables
             SET log = ?1, is_added = 1, failed_sites = ?2, updated_at = ?3
             WHERE id = ?4",
            params![log, failed, now, id],
        )?;
        if n == 0 {
            return Err(SchedulerError::RecordNotFound { id });
        }
        info!(record_id = id, "updated log for schedule record");
        Ok(())
    }
}

impl ActiveSiteSource for SqliteStore {
    fn list_active(&self) -> Result<Vec<SiteId>> {
        let mut stmt = self.conn.prepare(
            "SELECT site_id FROM heatmap_site
             WHERE status = 1 AND is_deleted = 0
             ORDER BY site_id",
        )?;
        let sites = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(SiteId))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        info!(count = sites.len(), "retrieved active sites");
        Ok(sites)
    }
}
