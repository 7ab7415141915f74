use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Number of daily slots the site list is spread over.
pub const DEFAULT_SLOTS: usize = 21;
/// Asia/Tokyo has no DST, so a fixed offset is exact.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LEAD_MONTHS: u32 = 1;
pub const DEFAULT_SECRET_NAME: &str = "rds/db-test-private";

/// Top-level config (heatmap.toml + HEATMAP_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeatmapConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub provision: ProvisionConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the schedule table and the site registry.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// How long a statement waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_secs: DEFAULT_BUSY_TIMEOUT_SECS,
        }
    }
}

/// Where the first slot of a distribution lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleAnchor {
    /// The 1st of the month the distribution runs in.
    #[default]
    MonthStart,
    /// The day the distribution runs.
    Today,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_slots")]
    pub slots: usize,
    #[serde(default)]
    pub anchor: ScheduleAnchor,
    /// Offset used to decide what "today" is.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS,
            anchor: ScheduleAnchor::default(),
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Tables are created for the month this many months after the run date.
    #[serde(default = "default_lead_months")]
    pub lead_months: u32,
    /// Database holding the `template_<kind>` tables.
    #[serde(default = "default_template_db")]
    pub template_db: String,
    /// Directory of per-site databases (`<site_id>.db`).
    #[serde(default = "default_sites_dir")]
    pub sites_dir: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            lead_months: DEFAULT_LEAD_MONTHS,
            template_db: default_template_db(),
            sites_dir: default_sites_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretSourceKind {
    /// `HEATMAP_DB_*` environment variables.
    #[default]
    Env,
    /// `<dir>/<name>.json` secret documents.
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub source: SecretSourceKind,
    #[serde(default = "default_secret_name")]
    pub name: String,
    #[serde(default = "default_secrets_dir")]
    pub dir: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            source: SecretSourceKind::default(),
            name: default_secret_name(),
            dir: default_secrets_dir(),
        }
    }
}

fn heatmap_home() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.heatmap", home)
}
fn default_db_path() -> String {
    format!("{}/heatmap.db", heatmap_home())
}
fn default_template_db() -> String {
    format!("{}/monthly_heatmap_table_template.db", heatmap_home())
}
fn default_sites_dir() -> String {
    format!("{}/sites", heatmap_home())
}
fn default_secrets_dir() -> String {
    format!("{}/secrets", heatmap_home())
}
fn default_secret_name() -> String {
    DEFAULT_SECRET_NAME.to_string()
}
fn default_busy_timeout_secs() -> u64 {
    DEFAULT_BUSY_TIMEOUT_SECS
}
fn default_slots() -> usize {
    DEFAULT_SLOTS
}
fn default_utc_offset_hours() -> i32 {
    DEFAULT_UTC_OFFSET_HOURS
}
fn default_lead_months() -> u32 {
    DEFAULT_LEAD_MONTHS
}

impl HeatmapConfig {
    /// Load config from a TOML file with HEATMAP_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `HEATMAP_SCHEDULE__SLOTS=14`. A missing file is not an error; every
    /// field has a default.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: HeatmapConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("HEATMAP_").split("__"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the jobs cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.slots == 0 {
            return Err(CoreError::Config("schedule.slots must be at least 1".into()));
        }
        if !(-12..=14).contains(&self.schedule.utc_offset_hours) {
            return Err(CoreError::Config(format!(
                "schedule.utc_offset_hours out of range: {}",
                self.schedule.utc_offset_hours
            )));
        }
        if self.database.path.trim().is_empty() {
            return Err(CoreError::Config("database.path is empty".into()));
        }
        if self.provision.template_db.trim().is_empty() {
            return Err(CoreError::Config("provision.template_db is empty".into()));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    format!("{}/heatmap.toml", heatmap_home())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = HeatmapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schedule.slots, 21);
        assert_eq!(config.schedule.anchor, ScheduleAnchor::MonthStart);
        assert_eq!(config.provision.lead_months, 1);
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.toml");
        std::fs::write(
            &path,
            r#"
            [database]
            path = "/tmp/heatmap-test.db"

            [schedule]
            slots = 7
            anchor = "today"

            [secrets]
            source = "file"
            name = "local"
            "#,
        )
        .unwrap();

        let config = HeatmapConfig::load(path.to_str()).unwrap();
        assert_eq!(config.database.path, "/tmp/heatmap-test.db");
        assert_eq!(config.database.busy_timeout_secs, DEFAULT_BUSY_TIMEOUT_SECS);
        assert_eq!(config.schedule.slots, 7);
        assert_eq!(config.schedule.anchor, ScheduleAnchor::Today);
        assert_eq!(config.secrets.source, SecretSourceKind::File);
        assert_eq!(config.secrets.name, "local");
    }

    #[test]
    fn zero_slots_rejected() {
        let mut config = HeatmapConfig::default();
        config.schedule.slots = 0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn offset_out_of_range_rejected() {
        let mut config = HeatmapConfig::default();
        config.schedule.utc_offset_hours = 20;
        assert!(config.validate().is_err());
    }
}
