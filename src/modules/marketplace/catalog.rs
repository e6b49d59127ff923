use super::client::decode_ok;
use super::service::MarketplaceService;
use crate::error::{AppError, AppResult};
use crate::models::{
    MyPublishedPackInfo, NotificationInfo, PackCategory, PackListingInfo, PurchasedPackInfo,
};
use reqwest::Method;
use serde::Deserialize;

#[derive(Deserialize)]
struct CategoriesEnvelope {
    #[serde(default)]
    categories: Vec<PackCategory>,
}

#[derive(Deserialize)]
struct PacksEnvelope<T> {
    #[serde(default = "Vec::new")]
    packs: Vec<T>,
}

#[derive(Deserialize)]
struct NotificationsEnvelope {
    #[serde(default)]
    notifications: Vec<NotificationInfo>,
}

#[derive(Deserialize)]
struct ListingLookup {
    #[serde(default)]
    listing_id: i64,
    #[serde(default)]
    share_token: String,
}

impl MarketplaceService {
    pub async fn categories(&self) -> AppResult<Vec<PackCategory>> {
        let response = self.client.request(Method::GET, "/api/categories").send().await?;
        let envelope: CategoriesEnvelope = decode_ok(response).await?;
        Ok(envelope.categories)
    }

    /// Lists marketplace packs, optionally restricted to one category.
    pub async fn browse_packs(&self, category_id: Option<i64>) -> AppResult<Vec<PackListingInfo>> {
        let mut request = self.client.request(Method::GET, "/api/packs");
        if let Some(id) = category_id.filter(|id| *id > 0) {
            request = request.query(&[("category_id", id)]);
        }
        let envelope: PacksEnvelope<PackListingInfo> = decode_ok(request.send().await?).await?;
        Ok(envelope.packs)
    }

    async fn my_listings(&self) -> Vec<PackListingInfo> {
        if let Err(e) = self.ensure_auth().await {
            self.sink
                .warn(&format!("Cannot list own packs without login: {}", e));
            return Vec::new();
        }
        let Some(user_id) = self.current_user_id() else {
            return Vec::new();
        };
        match self.browse_packs(None).await {
            Ok(packs) => packs.into_iter().filter(|p| p.user_id == user_id).collect(),
            Err(e) => {
                self.sink.warn(&format!("Failed to browse packs: {}", e));
                Vec::new()
            }
        }
    }

    /// Names of packs the current user has published. Failures yield an empty list.
    pub async fn my_shared_pack_names(&self) -> Vec<String> {
        self.my_listings()
            .await
            .into_iter()
            .map(|p| p.pack_name)
            .collect()
    }

    pub async fn my_published_packs(&self, source_name: Option<&str>) -> Vec<MyPublishedPackInfo> {
        let source_name = source_name.filter(|s| !s.is_empty());
        self.my_listings()
            .await
            .into_iter()
            .filter(|p| source_name.map_or(true, |s| p.source_name == s))
            .map(|p| MyPublishedPackInfo {
                listing_id: p.id,
                pack_name: p.pack_name,
                source_name: p.source_name,
                version: 0,
            })
            .collect()
    }

    /// Packs the current user has bought. Failures yield an empty list.
    pub async fn purchased_packs(&self) -> Vec<PurchasedPackInfo> {
        let result: AppResult<PacksEnvelope<PurchasedPackInfo>> = async {
            self.ensure_auth().await?;
            self.client.get_json("/api/packs/purchased").await
        }
        .await;
        match result {
            Ok(envelope) => envelope.packs,
            Err(e) => {
                self.sink
                    .warn(&format!("Failed to fetch purchased packs: {}", e));
                Vec::new()
            }
        }
    }

    pub async fn notifications(&self) -> AppResult<Vec<NotificationInfo>> {
        let response = self
            .client
            .request(Method::GET, "/api/notifications")
            .send()
            .await?;
        let envelope: NotificationsEnvelope = decode_ok(response).await?;
        Ok(envelope.notifications)
    }

    async fn lookup_listing(&self, pack_name: &str) -> AppResult<ListingLookup> {
        self.ensure_auth().await?;
        let response = self
            .client
            .authed(Method::GET, "/api/packs/listing-id")?
            .query(&[("pack_name", pack_name)])
            .send()
            .await?;
        decode_ok(response).await
    }

    pub async fn pack_listing_id(&self, pack_name: &str) -> AppResult<i64> {
        Ok(self.lookup_listing(pack_name).await?.listing_id)
    }

    pub async fn pack_share_token(&self, pack_name: &str) -> AppResult<String> {
        Ok(self.lookup_listing(pack_name).await?.share_token)
    }

    /// Public link for a published pack: `{share_base_url}/pack/<token>`.
    pub async fn share_url(&self, pack_name: &str) -> AppResult<String> {
        let token = self.pack_share_token(pack_name).await?;
        if token.is_empty() {
            return Err(AppError::Validation(format!(
                "pack {:?} has no share token",
                pack_name
            )));
        }
        let config = self.config.get_config()?;
        Ok(format!(
            "{}/pack/{}",
            config.share_base_url.trim().trim_end_matches('/'),
            token
        ))
    }
}
