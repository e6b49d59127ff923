use super::client::status_error;
use super::service::MarketplaceService;
use crate::constants::MAX_PACK_SIZE_BYTES;
use crate::error::{AppError, AppResult};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, StatusCode};
use std::path::Path;

impl MarketplaceService {
    /// Uploads a local pack archive as a new marketplace listing.
    pub async fn share_pack(
        &self,
        pack_path: &Path,
        category_id: i64,
        share_mode: &str,
        credits_price: i64,
        detailed_description: &str,
    ) -> AppResult<()> {
        self.ensure_auth().await?;
        let form = pack_form(pack_path)
            .await?
            .text("category_id", category_id.to_string())
            .text("share_mode", share_mode.to_string())
            .text("credits_price", credits_price.to_string())
            .text("detailed_description", detailed_description.to_string());

        let response = self
            .client
            .authed(Method::POST, "/api/packs/upload")?
            .multipart(form)
            .send()
            .await?;
        if !matches!(response.status(), StatusCode::OK | StatusCode::CREATED) {
            return Err(status_error(response).await);
        }
        self.sink.info(&format!("Shared pack {:?} to marketplace", pack_path));
        Ok(())
    }

    /// Replaces the archive behind an existing listing owned by the current user.
    pub async fn replace_pack(&self, pack_path: &Path, listing_id: i64) -> AppResult<()> {
        self.ensure_auth().await?;
        let form = pack_form(pack_path)
            .await?
            .text("listing_id", listing_id.to_string());

        let response = self
            .client
            .authed(Method::POST, "/api/packs/replace")?
            .multipart(form)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }
        self.sink
            .info(&format!("Replaced listing {} with {:?}", listing_id, pack_path));
        Ok(())
    }
}

/// Multipart form with the archive streamed from disk under the `file` field.
async fn pack_form(pack_path: &Path) -> AppResult<Form> {
    let size = check_pack_size(pack_path).await?;
    let file = tokio::fs::File::open(pack_path).await?;
    let file_name = pack_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pack.qap".to_string());
    let part = Part::stream_with_length(Body::from(file), size)
        .file_name(file_name)
        .mime_str("application/octet-stream")?;
    Ok(Form::new().part("file", part))
}

async fn check_pack_size(pack_path: &Path) -> AppResult<u64> {
    let metadata = tokio::fs::metadata(pack_path).await?;
    let size = metadata.len();
    if size > MAX_PACK_SIZE_BYTES {
        return Err(AppError::Validation(format!(
            "pack file too large ({}MB), maximum is {}MB",
            size / 1024 / 1024,
            MAX_PACK_SIZE_BYTES / 1024 / 1024
        )));
    }
    Ok(size)
}
