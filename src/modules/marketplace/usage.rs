use super::service::MarketplaceService;
use crate::error::{AppError, AppResult};
use crate::models::{
    now_rfc3339, PendingUsageRecord, Permission, PricingModel, ReportPackUsageResponse,
    UsageLicense,
};
use crate::utils::http::read_error_body;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Serialize)]
struct ReportUsageRequest<'a> {
    listing_id: i64,
    used_at: &'a str,
}

#[derive(Deserialize)]
struct LicensesEnvelope {
    #[serde(default)]
    licenses: Vec<UsageLicense>,
}

/// Outcome counts for one flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub requeued: usize,
    pub discarded: usize,
    /// Set when authentication failed and the queue was left untouched.
    pub skipped: bool,
}

impl fmt::Display for FlushSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted={} delivered={} requeued={} discarded={}",
            self.attempted, self.delivered, self.requeued, self.discarded
        )?;
        if self.skipped {
            write!(f, " (skipped: not authenticated)")?;
        }
        Ok(())
    }
}

impl MarketplaceService {
    /// Reports one use of a pack to the billing server.
    ///
    /// Any failure the server might not have seen (no token, transport error, non-400 status)
    /// queues the record for a later flush. A 400 is final and the record is dropped. A 200 that
    /// cannot be decoded counts as delivered.
    pub async fn report_pack_usage(
        &self,
        listing_id: i64,
        used_at: &str,
    ) -> AppResult<ReportPackUsageResponse> {
        match self.send_usage_report(listing_id, used_at).await {
            Ok(result) => {
                self.apply_usage_result(listing_id, &result);
                Ok(result)
            }
            Err(e) => {
                if e.is_retryable() {
                    if let Err(queue_err) = self
                        .pending
                        .enqueue(PendingUsageRecord::new(listing_id, used_at))
                    {
                        self.sink.error(&format!(
                            "Failed to queue usage report for listing {}: {}",
                            listing_id, queue_err
                        ));
                    }
                } else if matches!(e, AppError::Rejected(_)) {
                    self.sink.warn(&format!(
                        "Usage report for listing {} at {} rejected and dropped: {}",
                        listing_id, used_at, e
                    ));
                }
                Err(e)
            }
        }
    }

    async fn send_usage_report(
        &self,
        listing_id: i64,
        used_at: &str,
    ) -> AppResult<ReportPackUsageResponse> {
        let response = self
            .client
            .authed(Method::POST, "/api/packs/report-usage")?
            .json(&ReportUsageRequest {
                listing_id,
                used_at,
            })
            .send()
            .await?;

        // Only a 400 is final here. Every other status, 402 included, stays queued.
        match response.status() {
            StatusCode::OK => {}
            StatusCode::BAD_REQUEST => {
                return Err(AppError::Rejected(read_error_body(response).await));
            }
            status => {
                return Err(AppError::Server {
                    status: status.as_u16(),
                    body: read_error_body(response).await,
                });
            }
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Err(AppError::Json(serde::de::Error::custom(e))),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn apply_usage_result(&self, listing_id: i64, result: &ReportPackUsageResponse) {
        let is_per_use = self
            .licenses
            .get_license(listing_id)
            .is_some_and(|lic| lic.pricing_model == PricingModel::PerUse);
        if !is_per_use {
            return;
        }
        self.licenses.update_license(listing_id, |lic| {
            if result.total_purchased > 0 {
                lic.total_uses = result.total_purchased;
            }
            lic.remaining_uses = result.remaining_uses.max(0);
            lic.touch();
        });
        self.save_licenses();
        self.sink.info(&format!(
            "Synced license for listing {}: remaining={}, used={}, exhausted={}",
            listing_id,
            result.remaining_uses.max(0),
            result.used_count,
            result.exhausted
        ));
    }

    /// Delivers queued usage reports. At most one flush runs at a time; callers wait their turn.
    ///
    /// Each record is dequeued before it is reported, so a retryable failure re-queues it
    /// exactly once and a success leaves nothing behind.
    pub async fn flush_pending_usage_reports(&self) -> FlushSummary {
        let _guard = self.flush_lock.lock().await;
        let mut summary = FlushSummary::default();

        let records = self.pending.get_all();
        if records.is_empty() {
            return summary;
        }
        if let Err(e) = self.ensure_auth().await {
            self.sink.warn(&format!(
                "Skipping usage flush of {} records: {}",
                records.len(),
                e
            ));
            summary.skipped = true;
            return summary;
        }

        let total = records.len();
        for (index, record) in records.into_iter().enumerate() {
            if self.is_shutting_down() {
                self.sink.info(&format!(
                    "Shutdown requested; {} usage reports stay queued",
                    total - index
                ));
                break;
            }
            summary.attempted += 1;
            if let Err(e) = self.pending.dequeue(record.listing_id, &record.used_at) {
                self.sink.error(&format!(
                    "Failed to dequeue usage report for listing {}: {}",
                    record.listing_id, e
                ));
            }
            match self
                .report_pack_usage(record.listing_id, &record.used_at)
                .await
            {
                Ok(_) => summary.delivered += 1,
                Err(e) if e.is_retryable() => {
                    summary.requeued += 1;
                    self.sink.warn(&format!(
                        "Usage report for listing {} at {} still pending: {}",
                        record.listing_id, record.used_at, e
                    ));
                }
                Err(e) => {
                    summary.discarded += 1;
                    self.sink.warn(&format!(
                        "Usage report for listing {} at {} not retried: {}",
                        record.listing_id, record.used_at, e
                    ));
                }
            }
        }

        if let Err(e) = self.pending.save() {
            self.sink
                .error(&format!("Failed to persist pending usage queue: {}", e));
        }
        summary
    }

    /// Pulls the user's licenses from the server and replaces the cached copies.
    pub async fn refresh_licenses(&self) -> AppResult<usize> {
        self.ensure_auth().await?;
        let envelope: LicensesEnvelope = self.client.get_json("/api/packs/my-licenses").await?;

        let now = chrono::Utc::now();
        let stamp = now_rfc3339();
        let count = envelope.licenses.len();
        for mut license in envelope.licenses {
            license.updated_at = stamp.clone();
            if license.created_at.is_empty() {
                license.created_at = stamp.clone();
            }
            license.recompute_blocked(now);
            self.licenses.set_license(license);
        }
        self.licenses.save()?;
        Ok(count)
    }

    /// Refreshes licenses in the background and logs whether `listing_id` is now blocked.
    pub fn validate_subscription_license_async(&self, listing_id: i64) {
        let this = self.clone();
        self.spawn_validation(async move {
            this.sink.info(&format!(
                "Validating subscription for listing {}",
                listing_id
            ));
            if let Err(e) = this.refresh_licenses().await {
                this.sink
                    .warn(&format!("License refresh failed: {}", e));
                return;
            }
            match this.licenses.get_license(listing_id) {
                Some(lic) if lic.blocked => this.sink.info(&format!(
                    "Listing {} subscription confirmed expired, marked as blocked",
                    listing_id
                )),
                Some(_) => this
                    .sink
                    .info(&format!("Listing {} subscription still valid", listing_id)),
                None => {}
            }
        });
    }

    pub fn usage_licenses(&self) -> Vec<UsageLicense> {
        self.licenses.get_all_licenses()
    }

    pub fn pack_license_info(&self, listing_id: i64) -> Option<UsageLicense> {
        self.licenses.get_license(listing_id)
    }

    pub fn check_pack_permission(&self, listing_id: i64) -> Permission {
        self.licenses.check_permission(listing_id)
    }

    pub fn pack_password(&self, pack_path: &str) -> Option<String> {
        self.passwords.get_password(pack_path)
    }

    pub fn pack_passwords(&self) -> HashMap<String, String> {
        let mut passwords = HashMap::new();
        self.passwords.load_into_map(&mut passwords);
        passwords
    }

    pub fn forget_pack_password(&self, pack_path: &str) -> AppResult<()> {
        if self.passwords.delete_password(pack_path).is_some() {
            self.passwords.save()?;
        }
        Ok(())
    }
}
