// ── Reactive resource store ──
//
// Ordered entity storage with push-based change notification, fed by
// paginated fetches from the resource endpoint.

mod collection;
mod resource_store;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::Machine;

pub use resource_store::ResourceStore;

/// The store for the machine collection.
pub type MachineStore = ResourceStore<Machine>;

/// What `patch_one` does when no record carries the patch's id.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PatchMissPolicy {
    /// Silently do nothing.
    #[default]
    Ignore,
    /// Fail with [`CoreError::PatchTargetNotFound`].
    Reject,
    /// Append a record built from the patch.
    Insert,
}

/// How overlapping `fetch_all` calls are reconciled.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FetchPolicy {
    /// Uncoordinated; the last fetch to complete wins.
    #[default]
    Concurrent,
    /// A fetch completing after a newer one was issued is discarded.
    Supersede,
}

/// Result of [`ResourceStore::patch_one`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PatchOutcome {
    Merged,
    Ignored,
    Inserted,
}

/// Pagination for `fetch_all`. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub page: u32,
    pub per_page: u32,
}

impl PageParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    pub fn validate(self) -> Result<Self, CoreError> {
        if self.page == 0 {
            return Err(CoreError::ValidationFailed {
                message: "page numbers start at 1".into(),
            });
        }
        if self.per_page == 0 {
            return Err(CoreError::ValidationFailed {
                message: "per_page must be at least 1".into(),
            });
        }
        Ok(self)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

/// Outcome of one `fetch_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    /// Records in the response after duplicate collapse.
    pub count: usize,
    pub total: Option<u64>,
    pub page: u32,
    pub pages: Option<u32>,
    /// The response was discarded because a newer fetch was issued.
    pub superseded: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn page_params_reject_zero() {
        assert!(PageParams::new(0, 10).validate().is_err());
        assert!(PageParams::new(1, 0).validate().is_err());
        assert_eq!(PageParams::new(2, 10).validate().unwrap().page, 2);
    }

    #[test]
    fn policies_parse_from_config_strings() {
        assert_eq!(
            "reject".parse::<PatchMissPolicy>().unwrap(),
            PatchMissPolicy::Reject
        );
        assert_eq!(
            "supersede".parse::<FetchPolicy>().unwrap(),
            FetchPolicy::Supersede
        );
        assert_eq!(PatchMissPolicy::default().to_string(), "ignore");
    }
}
