use chrono::{Days, NaiveDate};
use heatmap_core::SiteId;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::error::{Result, SchedulerError};

/// One calendar day's share of the distributed site list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// 1-based slot index.
    pub day: usize,
    pub date: NaiveDate,
    pub sites: Vec<SiteId>,
}

impl ScheduleEntry {
    /// English weekday name, e.g. `"Monday"`.
    pub fn day_of_week(&self) -> String {
        self.date.format("%A").to_string()
    }

    pub fn sites_count(&self) -> usize {
        self.sites.len()
    }

    pub fn apply_on(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

impl Serialize for ScheduleEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ScheduleEntry", 4)?;
        s.serialize_field("date", &self.apply_on())?;
        s.serialize_field("day_of_week", &self.day_of_week())?;
        s.serialize_field("sites_count", &self.sites_count())?;
        s.serialize_field("sites", &self.sites)?;
        s.end()
    }
}

/// Slot-ordered distribution of sites over consecutive days.
///
/// Serialises as `{"day_1": {...}, "day_2": {...}}` in slot order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
}

impl Schedule {
    /// Assign `reference + (i - 1)` days to bucket `i`.
    pub fn build(buckets: Vec<Vec<SiteId>>, reference: NaiveDate) -> Result<Self> {
        let entries = buckets
            .into_iter()
            .enumerate()
            .map(|(idx, sites)| {
                let date = reference.checked_add_days(Days::new(idx as u64)).ok_or_else(|| {
                    SchedulerError::DateOverflow {
                        reference: reference.to_string(),
                        day: idx + 1,
                    }
                })?;
                Ok(ScheduleEntry {
                    day: idx + 1,
                    date,
                    sites,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn days(&self) -> usize {
        self.entries.len()
    }

    pub fn total_sites(&self) -> usize {
        self.entries.iter().map(ScheduleEntry::sites_count).sum()
    }

    /// Per-day view without the site lists.
    pub fn summary(&self) -> ScheduleSummary<'_> {
        ScheduleSummary(self)
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&format!("day_{}", entry.day), entry)?;
        }
        map.end()
    }
}

/// Borrowed summary of a [`Schedule`]: date, weekday and count per day.
pub struct ScheduleSummary<'a>(&'a Schedule);

#[derive(Serialize)]
struct DaySummary {
    date: String,
    day_of_week: String,
    sites_count: usize,
}

impl Serialize for ScheduleSummary<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.entries.len()))?;
        for entry in &self.0.entries {
            let day = DaySummary {
                date: entry.apply_on(),
                day_of_week: entry.day_of_week(),
                sites_count: entry.sites_count(),
            };
            map.serialize_entry(&format!("day_{}", entry.day), &day)?;
        }
        map.end()
    }
}
