//! `heatmap-core`: shared building blocks for the heatmap site-table jobs.
//!
//! Holds the typed configuration, the [`SiteId`](types::SiteId) newtype, the
//! month arithmetic used to pick the provisioning period, and the database
//! secret collaborators.

pub mod calendar;
pub mod config;
pub mod error;
pub mod secret;
pub mod types;

pub use calendar::{plus_months, TargetMonth};
pub use config::HeatmapConfig;
pub use error::{CoreError, Result};
pub use types::SiteId;
