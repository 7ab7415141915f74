//! `heatmap-scheduler`: spreads the active site list over daily slots and
//! persists one schedule row per day in SQLite.
//!
//! # Flow
//!
//! | Step                          | Module         |
//! |-------------------------------|----------------|
//! | Read active sites             | [`store`]      |
//! | Split into K fair buckets     | [`chunk`]      |
//! | Attach one date per bucket    | [`schedule`]   |
//! | Upsert every slot atomically  | [`distribute`] |
//!
//! The provisioning job later reads back the row due on its run date via
//! [`store::ScheduleStore::find_due`].

pub mod chunk;
pub mod db;
pub mod distribute;
pub mod error;
pub mod schedule;
pub mod store;

pub use chunk::chunk;
pub use error::{Result, SchedulerError};
pub use schedule::{Schedule, ScheduleEntry};
pub use store::{ActiveSiteSource, ScheduleRecord, ScheduleStore, SqliteStore};
