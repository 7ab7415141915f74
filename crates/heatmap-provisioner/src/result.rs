use std::collections::BTreeSet;

use heatmap_core::SiteId;
use serde::Serialize;

/// What happened to one site during a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SiteOutcome {
    /// All tables exist and the site's work is committed.
    Provisioned,
    /// The site is no longer active; nothing was created. Counts as success.
    SkippedInactive,
    /// At least one table could not be created; the site's work was rolled back.
    Failed { reason: String },
}

impl SiteOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SiteOutcome::Failed { .. })
    }
}

/// Per-run tally, built up one site at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningResult {
    pub success_count: usize,
    pub failure_count: usize,
    /// Successes that were inactive sites (included in `success_count`).
    pub skipped_count: usize,
    pub failed_site_ids: BTreeSet<SiteId>,
    #[serde(skip)]
    pub outcomes: Vec<(SiteId, SiteOutcome)>,
}

impl ProvisioningResult {
    pub fn record(&mut self, site: SiteId, outcome: SiteOutcome) {
        match &outcome {
            SiteOutcome::Provisioned => self.success_count += 1,
            SiteOutcome::SkippedInactive => {
                self.success_count += 1;
                self.skipped_count += 1;
            }
            SiteOutcome::Failed { .. } => {
                self.failure_count += 1;
                self.failed_site_ids.insert(site);
            }
        }
        self.outcomes.push((site, outcome));
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// Failed sites in the order they were processed, each once.
    pub fn failed_in_run_order(&self) -> Vec<SiteId> {
        let mut seen = BTreeSet::new();
        self.outcomes
            .iter()
            .filter(|(id, outcome)| !outcome.is_success() && seen.insert(*id))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn outcome_of(&self, site: SiteId) -> Option<&SiteOutcome> {
        self.outcomes
            .iter()
            .rev()
            .find(|(id, _)| *id == site)
            .map(|(_, outcome)| outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_each_outcome() {
        let mut result = ProvisioningResult::default();
        result.record(SiteId(1), SiteOutcome::Provisioned);
        result.record(SiteId(2), SiteOutcome::SkippedInactive);
        result.record(
            SiteId(3),
            SiteOutcome::Failed {
                reason: "boom".into(),
            },
        );

        assert_eq!(result.success_count, 2);
        assert_eq!(result.skipped_count, 1);
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.total(), 3);
        assert!(result.has_failures());
        assert_eq!(result.failed_site_ids.iter().copied().collect::<Vec<_>>(), vec![SiteId(3)]);
        assert_eq!(result.outcome_of(SiteId(2)), Some(&SiteOutcome::SkippedInactive));
    }

    #[test]
    fn failed_ids_keep_run_order() {
        let mut result = ProvisioningResult::default();
        for id in [40, 3, 12] {
            let outcome = if id == 3 {
                SiteOutcome::Provisioned
            } else {
                SiteOutcome::Failed { reason: "x".into() }
            };
            result.record(SiteId(id), outcome);
        }
        assert_eq!(result.failed_in_run_order(), vec![SiteId(40), SiteId(12)]);
        assert!(result.failed_site_ids.contains(&SiteId(12)));
    }

    #[test]
    fn empty_result_has_no_failures() {
        let result = ProvisioningResult::default();
        assert!(!result.has_failures());
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn serialises_counts_without_outcomes() {
        let mut result = ProvisioningResult::default();
        result.record(SiteId(7), SiteOutcome::Failed { reason: "x".into() });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["failure_count"], 1);
        assert_eq!(value["failed_site_ids"], serde_json::json!([7]));
        assert!(value.get("outcomes").is_none());
    }
}
