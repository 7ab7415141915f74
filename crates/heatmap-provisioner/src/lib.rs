//! `heatmap-provisioner`: creates next month's per-site heatmap tables for
//! the sites scheduled on a given day.
//!
//! For each due site the four tables `<YYYYMM>_referrer`, `_click`, `_read`
//! and `_scroll` are cloned from `template_<kind>` with create-if-not-exists
//! semantics and committed before moving to the next site. A failing site is
//! recorded in the [`ProvisioningResult`] and never aborts the batch. The
//! outcome is written back into the schedule record by [`audit`].

pub mod audit;
pub mod error;
pub mod provisioner;
pub mod result;
pub mod run;
pub mod tables;

pub use error::{ProvisionError, Result};
pub use provisioner::{TableProvisioner, RESOURCE_KINDS};
pub use result::{ProvisioningResult, SiteOutcome};
pub use run::{run_provisioning, ProvisionReport, RunMode, RunOptions};
pub use tables::{SiteTables, SqliteSiteTables};
