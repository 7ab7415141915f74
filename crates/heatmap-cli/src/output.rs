use std::path::{Path, PathBuf};

use heatmap_scheduler::distribute::DistributionReport;
use heatmap_scheduler::schedule::ScheduleSummary;
use heatmap_scheduler::Schedule;
use serde::Serialize;

pub const SCHEDULE_OUTPUT_FILE: &str = "schedule_output.json";
pub const SCHEDULE_SUMMARY_FILE: &str = "schedule_summary.json";

pub const SUMMARY_HEADERS: [&str; 4] = ["Day", "Date", "Day of Week", "Sites Count"];

/// What `distribute` prints: counts and the per-day summary, not every id.
#[derive(Serialize)]
pub struct DistributeView<'a> {
    pub message: &'a str,
    pub total_sites: usize,
    pub days: usize,
    pub summary: ScheduleSummary<'a>,
}

impl<'a> DistributeView<'a> {
    pub fn new(report: &'a DistributionReport) -> Self {
        Self {
            message: &report.message,
            total_sites: report.total_sites,
            days: report.days,
            summary: report.schedule.summary(),
        }
    }
}

/// Full schedule dump written by `plan --out`.
#[derive(Serialize)]
struct ScheduleOutput<'a> {
    message: &'a str,
    total_sites: usize,
    days: usize,
    schedule: &'a Schedule,
    summary: ScheduleSummary<'a>,
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Left-aligned columns, two spaces apart, dashed rule under the header.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:w$}", cell))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers.to_vec()));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&line(rule.iter().map(String::as_str).collect()));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

pub fn summary_rows(schedule: &Schedule) -> Vec<Vec<String>> {
    schedule
        .entries
        .iter()
        .map(|entry| {
            vec![
                entry.day.to_string(),
                entry.apply_on(),
                entry.day_of_week(),
                entry.sites_count().to_string(),
            ]
        })
        .collect()
}

/// Write the full and summary-only schedule files into `dir`.
pub fn write_schedule_files(dir: &Path, report: &DistributionReport) -> anyhow::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;

    let full = ScheduleOutput {
        message: &report.message,
        total_sites: report.total_sites,
        days: report.days,
        schedule: &report.schedule,
        summary: report.schedule.summary(),
    };
    let full_path = dir.join(SCHEDULE_OUTPUT_FILE);
    std::fs::write(&full_path, serde_json::to_string_pretty(&full)?)?;

    let summary_path = dir.join(SCHEDULE_SUMMARY_FILE);
    std::fs::write(&summary_path, serde_json::to_string_pretty(&report.schedule.summary())?)?;

    Ok((full_path, summary_path))
}
