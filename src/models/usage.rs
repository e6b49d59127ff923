use serde::{Deserialize, Serialize};

/// A usage event that has not been confirmed delivered to the billing server.
///
/// Identity is the exact `(listing_id, used_at)` pair; the queue may hold duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUsageRecord {
    pub listing_id: i64,
    /// RFC3339 timestamp of the use.
    pub used_at: String,
}

impl PendingUsageRecord {
    pub fn new(listing_id: i64, used_at: impl Into<String>) -> Self {
        Self {
            listing_id,
            used_at: used_at.into(),
        }
    }

    pub fn matches(&self, listing_id: i64, used_at: &str) -> bool {
        self.listing_id == listing_id && self.used_at == used_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReportPackUsageResponse {
    #[serde(default)]
    pub remaining_uses: i64,
    #[serde(default)]
    pub total_purchased: i64,
    #[serde(default)]
    pub used_count: i64,
    #[serde(default)]
    pub exhausted: bool,
}
