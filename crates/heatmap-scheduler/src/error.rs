use heatmap_core::{CoreError, SiteId};
use thiserror::Error;

/// Errors raised while building or persisting a distribution.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A slot date fell outside the representable calendar range.
    #[error("Date overflow: slot {day} from {reference}")]
    DateOverflow { reference: String, day: usize },

    /// A persisted row could not be decoded.
    #[error("Corrupt schedule record {id}: {reason}")]
    CorruptRecord { id: i64, reason: String },

    /// No schedule row with the given ID exists in the store.
    #[error("Schedule record not found: {id}")]
    RecordNotFound { id: i64 },

    /// The same site appeared twice in a distribution input.
    #[error("Duplicate site id in distribution: {0}")]
    DuplicateSite(SiteId),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
