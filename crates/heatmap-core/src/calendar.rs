use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Gregorian leap-year rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-based) of `year`, `None` outside `1..=12`.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => Some(31),
        4 | 6 | 9 | 11 => Some(30),
        2 if is_leap_year(year) => Some(29),
        2 => Some(28),
        _ => None,
    }
}

/// Add `months` calendar months to `date`.
///
/// The day is clamped to the last day of the resulting month, so
/// `2024-01-31 + 1` is `2024-02-29` and `2023-01-31 + 1` is `2023-02-28`.
pub fn plus_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    let total = date.month0() as i64 + months as i64;
    let year = i32::try_from(date.year() as i64 + total / 12)
        .map_err(|_| CoreError::InvalidDate(format!("{date} + {months} months")))?;
    // total % 12 is in 0..12
    let month = (total % 12) as u32 + 1;
    let last = days_in_month(year, month)
        .ok_or_else(|| CoreError::InvalidDate(format!("{date} + {months} months")))?;
    let day = date.day().min(last);

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| CoreError::InvalidDate(format!("{date} + {months} months")))
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Today's calendar date at a fixed UTC offset (e.g. `9` for Asia/Tokyo).
pub fn today_at_offset(utc_offset_hours: i32) -> Result<NaiveDate> {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600).ok_or_else(|| {
        CoreError::Config(format!("utc offset out of range: {utc_offset_hours}h"))
    })?;
    Ok(Utc::now().with_timezone(&offset).date_naive())
}

/// The calendar month resources are provisioned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMonth {
    pub year: i32,
    pub month: u32,
}

impl TargetMonth {
    /// Month reached by adding `lead_months` to `today`.
    pub fn from_date(today: NaiveDate, lead_months: u32) -> Result<Self> {
        let target = plus_months(today, lead_months)?;
        Ok(Self {
            year: target.year(),
            month: target.month(),
        })
    }

    /// `YYYYMM` prefix used in provisioned table names.
    pub fn stamp(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for TargetMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Months;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn clamps_to_leap_february() {
        assert_eq!(plus_months(d(2024, 1, 31), 1).unwrap(), d(2024, 2, 29));
    }

    #[test]
    fn clamps_to_common_february() {
        assert_eq!(plus_months(d(2023, 1, 31), 1).unwrap(), d(2023, 2, 28));
    }

    #[test]
    fn rolls_over_year() {
        assert_eq!(plus_months(d(2024, 11, 15), 3).unwrap(), d(2025, 2, 15));
        assert_eq!(plus_months(d(2024, 12, 1), 1).unwrap(), d(2025, 1, 1));
    }

    #[test]
    fn clamps_31_into_30_day_month() {
        assert_eq!(plus_months(d(2025, 3, 31), 1).unwrap(), d(2025, 4, 30));
    }

    #[test]
    fn zero_months_is_identity() {
        assert_eq!(plus_months(d(2024, 2, 29), 0).unwrap(), d(2024, 2, 29));
    }

    #[test]
    fn leap_day_plus_a_year_clamps() {
        assert_eq!(plus_months(d(2024, 2, 29), 12).unwrap(), d(2025, 2, 28));
    }

    #[test]
    fn century_leap_rules() {
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert_eq!(days_in_month(1900, 2), Some(28));
        assert_eq!(days_in_month(2000, 2), Some(29));
    }

    #[test]
    fn month_out_of_range_has_no_length() {
        assert_eq!(days_in_month(2025, 0), None);
        assert_eq!(days_in_month(2025, 13), None);
        assert_eq!(days_in_month(2025, 12), Some(31));
    }

    #[test]
    fn agrees_with_chrono_over_a_long_range() {
        let mut date = d(1999, 1, 31);
        while date < d(2031, 1, 1) {
            for months in [1u32, 2, 5, 11, 13, 25] {
                let expected = date.checked_add_months(Months::new(months)).unwrap();
                assert_eq!(plus_months(date, months).unwrap(), expected, "{date} + {months}");
            }
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn target_month_stamp() {
        let month = TargetMonth::from_date(d(2025, 12, 31), 1).unwrap();
        assert_eq!(month, TargetMonth { year: 2026, month: 1 });
        assert_eq!(month.stamp(), "202601");
        assert_eq!(month.to_string(), "2026-01");
    }

    #[test]
    fn month_start_resets_day() {
        assert_eq!(month_start(d(2025, 7, 19)), d(2025, 7, 1));
    }

    #[test]
    fn rejects_out_of_range_offset() {
        assert!(today_at_offset(30).is_err());
        assert!(today_at_offset(9).is_ok());
    }
}
