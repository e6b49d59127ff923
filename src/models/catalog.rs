use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_preset: bool,
    #[serde(default)]
    pub pack_count: i64,
}

/// A marketplace listing without its archive payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackListingInfo {
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub category_id: i64,
    #[serde(default)]
    pub category_name: String,
    pub pack_name: String,
    #[serde(default)]
    pub pack_description: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub share_mode: String,
    #[serde(default)]
    pub credits_price: i64,
    #[serde(default)]
    pub download_count: i64,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasedPackInfo {
    pub listing_id: i64,
    pub pack_name: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub share_mode: String,
    #[serde(default)]
    pub credits_price: i64,
    #[serde(default)]
    pub purchase_date: String,
    #[serde(default)]
    pub expires_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MyPublishedPackInfo {
    pub listing_id: i64,
    pub pack_name: String,
    pub source_name: String,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationInfo {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: String,
}
