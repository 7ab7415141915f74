use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a managed site, as stored in `heatmap_site.site_id`.
///
/// Serialises as a bare JSON number so persisted site lists stay a plain
/// `[1, 2, 3]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub i64);

impl SiteId {
    pub fn get(self) -> i64 {
        self.0
    }

    /// Schema alias under which this site's database is attached.
    pub fn schema_alias(self) -> String {
        format!("site_{}", self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SiteId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_list_serialises_as_number_array() {
        let sites = vec![SiteId(3), SiteId(1), SiteId(2)];
        let json = serde_json::to_string(&sites).unwrap();
        assert_eq!(json, "[3,1,2]");

        let back: Vec<SiteId> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sites);
    }

    #[test]
    fn schema_alias_is_prefixed() {
        assert_eq!(SiteId(42).schema_alias(), "site_42");
    }
}
