use std::collections::HashSet;

use heatmap_core::{SiteId, TargetMonth};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::result::{ProvisioningResult, SiteOutcome};
use crate::tables::SiteTables;

/// Monthly table kinds created for every active site.
pub const RESOURCE_KINDS: [&str; 4] = ["referrer", "click", "read", "scroll"];

/// `<YYYYMM>_<kind>`, e.g. `202511_click`.
pub fn table_name(month: TargetMonth, kind: &str) -> String {
    format!("{}_{}", month.stamp(), kind)
}

/// `template_<kind>`.
pub fn template_name(kind: &str) -> String {
    format!("template_{kind}")
}

/// Creates each due site's monthly tables, one committed unit of work per site.
pub struct TableProvisioner<T: SiteTables> {
    tables: T,
}

impl<T: SiteTables> TableProvisioner<T> {
    pub fn new(tables: T) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &T {
        &self.tables
    }

    /// Provision `site_list` in order for `month`.
    ///
    /// Sites missing from `active` count as successes and get no tables. A
    /// failing site is recorded and the batch moves on; nothing here aborts
    /// the run.
    pub fn provision(
        &mut self,
        site_list: &[SiteId],
        active: &HashSet<SiteId>,
        month: TargetMonth,
    ) -> ProvisioningResult {
        let mut result = ProvisioningResult::default();
        info!(total = site_list.len(), month = %month, "processing sites");

        for &site in site_list {
            let outcome = if !active.contains(&site) {
                debug!(site_id = %site, "site no longer active; skipping");
                SiteOutcome::SkippedInactive
            } else {
                match self.provision_site(site, month) {
                    Ok(()) => SiteOutcome::Provisioned,
                    Err(e) => {
                        error!(site_id = %site, error = %e, "site provisioning failed");
                        SiteOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            };
            result.record(site, outcome);
        }

        info!(
            success = result.success_count,
            skipped = result.skipped_count,
            failed = result.failure_count,
            "sites processed"
        );
        result
    }

    fn provision_site(&mut self, site: SiteId, month: TargetMonth) -> Result<()> {
        self.tables.begin(site)?;

        let created = RESOURCE_KINDS.iter().try_for_each(|kind| {
            self.tables
                .create_like(site, &table_name(month, kind), &template_name(kind))
        });
        if let Err(e) = created.and_then(|()| self.tables.commit(site)) {
            self.tables.rollback(site);
            return Err(e);
        }

        debug!(site_id = %site, "site tables committed");
        Ok(())
    }
}
