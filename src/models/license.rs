use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Billing model of a listing. Values this build does not know are kept verbatim so they
/// survive a save; a missing value is `Unknown("")`, never per-use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PricingModel {
    Free,
    PerUse,
    Subscription,
    TimeLimited,
    Unknown(String),
}

impl Default for PricingModel {
    fn default() -> Self {
        PricingModel::Unknown(String::new())
    }
}

impl PricingModel {
    pub fn as_str(&self) -> &str {
        match self {
            PricingModel::Free => "free",
            PricingModel::PerUse => "per_use",
            PricingModel::Subscription => "subscription",
            PricingModel::TimeLimited => "time_limited",
            PricingModel::Unknown(raw) => raw,
        }
    }

    /// Models whose entitlement ends at `expires_at`.
    pub fn is_time_bound(&self) -> bool {
        matches!(self, PricingModel::Subscription | PricingModel::TimeLimited)
    }
}

impl From<String> for PricingModel {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "free" => PricingModel::Free,
            "per_use" => PricingModel::PerUse,
            "subscription" => PricingModel::Subscription,
            "time_limited" => PricingModel::TimeLimited,
            _ => PricingModel::Unknown(raw),
        }
    }
}

impl From<PricingModel> for String {
    fn from(model: PricingModel) -> Self {
        match model {
            PricingModel::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// Local record of the user's entitlement to a marketplace listing.
///
/// Only server responses create or change these; the client never decrements on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLicense {
    pub listing_id: i64,
    #[serde(default)]
    pub pack_name: String,
    #[serde(default)]
    pub pricing_model: PricingModel,
    #[serde(default)]
    pub remaining_uses: i64,
    #[serde(default)]
    pub total_uses: i64,
    #[serde(default)]
    pub expires_at: String,
    #[serde(default)]
    pub subscription_months: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl UsageLicense {
    pub fn new(listing_id: i64, pack_name: impl Into<String>, pricing_model: PricingModel) -> Self {
        let now = now_rfc3339();
        Self {
            listing_id,
            pack_name: pack_name.into(),
            pricing_model,
            remaining_uses: 0,
            total_uses: 0,
            expires_at: String::new(),
            subscription_months: 0,
            blocked: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Recomputes `blocked` from `expires_at`. Per-use and free licenses are left alone; an
    /// unparsable expiry is treated as not expired.
    pub fn recompute_blocked(&mut self, now: DateTime<Utc>) {
        if !self.pricing_model.is_time_bound() {
            return;
        }
        self.blocked = match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires_at) => now >= expires_at.with_timezone(&Utc),
            Err(_) => false,
        };
    }

    pub fn touch(&mut self) {
        self.updated_at = now_rfc3339();
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Outcome of a local permission check before running a pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Permission {
    Allowed,
    Denied(String),
}

impl Permission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Permission::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(expires_at: &str) -> UsageLicense {
        let mut lic = UsageLicense::new(7, "churn", PricingModel::Subscription);
        lic.expires_at = expires_at.to_string();
        lic
    }

    #[test]
    fn expired_subscription_is_blocked() {
        let now = Utc::now();
        let mut lic = subscription(&(now - Duration::days(1)).to_rfc3339());
        lic.recompute_blocked(now);
        assert!(lic.blocked);
    }

    #[test]
    fn future_subscription_is_not_blocked() {
        let now = Utc::now();
        let mut lic = subscription(&(now + Duration::days(30)).to_rfc3339());
        lic.blocked = true;
        lic.recompute_blocked(now);
        assert!(!lic.blocked);
    }

    #[test]
    fn unparsable_expiry_fails_open() {
        let mut lic = subscription("next tuesday");
        lic.blocked = true;
        lic.recompute_blocked(Utc::now());
        assert!(!lic.blocked);
    }

    #[test]
    fn per_use_license_ignores_expiry() {
        let mut lic = UsageLicense::new(3, "funnel", PricingModel::PerUse);
        lic.expires_at = "2000-01-01T00:00:00Z".to_string();
        lic.recompute_blocked(Utc::now());
        assert!(!lic.blocked);
    }

    #[test]
    fn unknown_pricing_model_is_kept_verbatim() {
        let lic: UsageLicense = serde_json::from_value(serde_json::json!({
            "listing_id": 1,
            "pricing_model": "lifetime"
        }))
        .unwrap();
        assert_eq!(lic.pricing_model, PricingModel::Unknown("lifetime".to_string()));
        assert_eq!(lic.remaining_uses, 0);

        let saved = serde_json::to_value(&lic).unwrap();
        assert_eq!(saved["pricing_model"], "lifetime");
    }

    #[test]
    fn missing_pricing_model_is_not_per_use() {
        let lic: UsageLicense =
            serde_json::from_value(serde_json::json!({ "listing_id": 2 })).unwrap();
        assert_eq!(lic.pricing_model, PricingModel::default());
        assert_ne!(lic.pricing_model, PricingModel::PerUse);

        let known: UsageLicense = serde_json::from_value(serde_json::json!({
            "listing_id": 3,
            "pricing_model": "time_limited"
        }))
        .unwrap();
        assert_eq!(known.pricing_model, PricingModel::TimeLimited);
        assert_eq!(
            serde_json::to_value(&known).unwrap()["pricing_model"],
            "time_limited"
        );
    }
}
