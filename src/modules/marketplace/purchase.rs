use super::client::status_error;
use super::service::MarketplaceService;
use crate::constants::{ENCRYPTION_PASSWORD_HEADER, MAX_PACK_SIZE_BYTES, USAGE_LICENSE_HEADER};
use crate::error::{AppError, AppResult};
use crate::models::{now_rfc3339, UsageLicense};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Deserialize)]
struct CreditsBalance {
    #[serde(default)]
    credits_balance: f64,
}

#[derive(Serialize)]
struct PurchaseUsesRequest {
    quantity: i64,
}

#[derive(Deserialize)]
struct PurchaseUsesResponse {
    #[serde(default)]
    remaining_uses: i64,
}

#[derive(Serialize)]
struct RenewRequest {
    months: i64,
}

#[derive(Deserialize)]
struct RenewResponse {
    #[serde(default)]
    expires_at: String,
    #[serde(default)]
    subscription_months: i64,
}

impl MarketplaceService {
    pub async fn credits_balance(&self) -> AppResult<f64> {
        self.ensure_auth().await?;
        let balance: CreditsBalance = self.client.get_json("/api/credits/balance").await?;
        Ok(balance.credits_balance)
    }

    /// Buys more uses of a per-use pack and folds the result into the local license.
    pub async fn purchase_additional_uses(&self, listing_id: i64, quantity: i64) -> AppResult<()> {
        if quantity <= 0 {
            return Err(AppError::Validation(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }
        self.ensure_auth().await?;
        let result: PurchaseUsesResponse = self
            .client
            .post_json(
                &format!("/api/packs/{}/purchase-uses", listing_id),
                &PurchaseUsesRequest { quantity },
            )
            .await?;

        let updated = self.licenses.update_license(listing_id, |lic| {
            lic.remaining_uses = (lic.remaining_uses + result.remaining_uses).max(0);
            lic.total_uses += quantity;
            lic.touch();
        });
        if updated {
            self.save_licenses();
        }
        self.sink.info(&format!(
            "Purchased {} uses of listing {}",
            quantity, listing_id
        ));
        Ok(())
    }

    pub async fn renew_subscription(&self, listing_id: i64, months: i64) -> AppResult<()> {
        if months <= 0 {
            return Err(AppError::Validation(format!(
                "months must be positive, got {}",
                months
            )));
        }
        self.ensure_auth().await?;
        let result: RenewResponse = self
            .client
            .post_json(
                &format!("/api/packs/{}/renew", listing_id),
                &RenewRequest { months },
            )
            .await?;

        let now = chrono::Utc::now();
        let updated = self.licenses.update_license(listing_id, |lic| {
            lic.expires_at = result.expires_at.clone();
            lic.subscription_months = result.subscription_months;
            lic.recompute_blocked(now);
            lic.touch();
        });
        if updated {
            self.save_licenses();
        }
        self.sink.info(&format!(
            "Renewed listing {} until {}",
            listing_id, result.expires_at
        ));
        Ok(())
    }

    /// Downloads a pack into `<cache>/qap/marketplace_pack_<id>.qap` and returns the path.
    ///
    /// The body is streamed to a temp file in the same directory and capped at the pack size
    /// limit. Side-channel headers seed the password store and the usage license.
    pub async fn download_pack(&self, listing_id: i64) -> AppResult<PathBuf> {
        self.ensure_auth().await?;
        let mut response = self
            .client
            .authed(Method::GET, &format!("/api/packs/{}/download", listing_id))?
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_PACK_SIZE_BYTES)
        {
            return Err(oversize_error());
        }
        let headers = response.headers().clone();

        let qap_dir = self.qap_dir()?;
        tokio::fs::create_dir_all(&qap_dir).await?;
        let file_name = format!("marketplace_pack_{}.qap", listing_id);
        let final_path = qap_dir.join(&file_name);
        let temp_path = qap_dir.join(format!("{}.download", file_name));

        let written = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            let mut written: u64 = 0;
            while let Some(chunk) = response.chunk().await? {
                written += chunk.len() as u64;
                if written > MAX_PACK_SIZE_BYTES {
                    return Err(oversize_error());
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<u64, AppError>(written)
        }
        .await;
        let written = match written {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        remove_stale_copies(&qap_dir, listing_id).await;
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        self.apply_download_headers(&headers, &final_path);
        self.sink.info(&format!(
            "Downloaded listing {} ({} bytes) to {:?}",
            listing_id, written, final_path
        ));
        Ok(final_path)
    }

    fn apply_download_headers(&self, headers: &HeaderMap, pack_path: &Path) {
        let password = headers
            .get(ENCRYPTION_PASSWORD_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());
        if let Some(password) = password {
            self.passwords
                .set_password(pack_path.to_string_lossy(), password);
            if let Err(e) = self.passwords.save() {
                self.sink
                    .error(&format!("Failed to save pack password: {}", e));
            }
        }

        let license_header = headers
            .get(USAGE_LICENSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());
        if let Some(raw) = license_header {
            match serde_json::from_str::<UsageLicense>(raw) {
                Ok(mut license) => {
                    let now = now_rfc3339();
                    if license.created_at.is_empty() {
                        license.created_at = now.clone();
                    }
                    license.updated_at = now;
                    license.recompute_blocked(chrono::Utc::now());
                    self.licenses.set_license(license);
                    self.save_licenses();
                }
                Err(e) => self
                    .sink
                    .warn(&format!("Ignoring malformed {} header: {}", USAGE_LICENSE_HEADER, e)),
            }
        }
    }

    pub(super) fn save_licenses(&self) {
        if let Err(e) = self.licenses.save() {
            self.sink
                .error(&format!("Failed to save usage licenses: {}", e));
        }
    }
}

fn oversize_error() -> AppError {
    AppError::Validation(format!(
        "downloaded file exceeds maximum size limit ({}MB)",
        MAX_PACK_SIZE_BYTES / 1024 / 1024
    ))
}

/// Removes `marketplace_pack_<id>_*.qap` copies left by older timestamped downloads.
async fn remove_stale_copies(qap_dir: &Path, listing_id: i64) {
    let prefix = format!("marketplace_pack_{}_", listing_id);
    let Ok(mut entries) = tokio::fs::read_dir(qap_dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".qap") {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                tracing::debug!("Failed to remove stale pack {:?}: {}", entry.path(), e);
            }
        }
    }
}
