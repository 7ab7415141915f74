use heatmap_core::CoreError;
use heatmap_scheduler::SchedulerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The template database file does not exist.
    #[error("Template database not found: {path}")]
    TemplateDbMissing { path: String },

    /// No table with this name exists in the template database.
    #[error("Template table not found: {template}")]
    TemplateMissing { template: String },

    /// The template DDL could not be rewritten for the target table.
    #[error("Unusable template DDL for {template}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// Table names are restricted to `[A-Za-z0-9_]`.
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
