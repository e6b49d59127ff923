use crate::error::{AppError, AppResult};
use crate::models::AppConfig;
use crate::utils::http::{create_client, looks_like_html, read_error_body};
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// HTTP access to the marketplace and license servers, plus the current bearer token.
pub struct MarketplaceClient {
    server_url: String,
    license_server_url: String,
    token: RwLock<Option<String>>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct InsufficientCreditsBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    required: i64,
    #[serde(default)]
    balance: f64,
}

impl MarketplaceClient {
    pub fn new(server_url: &str, license_server_url: &str, timeout_secs: u64) -> Self {
        Self {
            server_url: server_url.trim().trim_end_matches('/').to_string(),
            license_server_url: license_server_url.trim().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
            http: create_client(timeout_secs),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.marketplace_server_url,
            &config.license_server_url,
            config.request_timeout_secs,
        )
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn license_server_url(&self) -> &str {
        &self.license_server_url
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    pub fn set_token(&self, token: String) {
        *self.token.write() = Some(token);
    }

    pub fn clear_token(&self) {
        *self.token.write() = None;
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    pub fn license_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.license_server_url, path)
    }

    /// Marketplace request carrying the bearer token when one is cached.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.endpoint(path));
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Marketplace request that requires a cached token.
    pub fn authed(&self, method: Method, path: &str) -> AppResult<RequestBuilder> {
        let token = self.token().ok_or(AppError::NotLoggedIn)?;
        Ok(self
            .http
            .request(method, self.endpoint(path))
            .bearer_auth(token))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.authed(Method::GET, path)?.send().await?;
        decode_ok(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.authed(Method::POST, path)?.json(body).send().await?;
        decode_ok(response).await
    }
}

/// Decodes a 200 body, or turns any other status into the matching error.
pub async fn decode_ok<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    if response.status() != StatusCode::OK {
        return Err(status_error(response).await);
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Maps a non-success response to an error, recognizing the 402 insufficient-credits body.
pub async fn status_error(response: Response) -> AppError {
    let status = response.status();
    let body = read_error_body(response).await;
    if status == StatusCode::PAYMENT_REQUIRED {
        if let Ok(parsed) = serde_json::from_str::<InsufficientCreditsBody>(&body) {
            if parsed.error == "INSUFFICIENT_CREDITS" {
                return AppError::InsufficientCredits {
                    required: parsed.required,
                    balance: parsed.balance,
                };
            }
        }
    }
    AppError::Server {
        status: status.as_u16(),
        body,
    }
}

/// Like `decode_ok`, but an HTML body is reported as a misconfigured server.
pub async fn decode_auth_response<T: DeserializeOwned>(
    response: Response,
    server: &str,
) -> AppResult<T> {
    let status = response.status();
    let text = response.text().await?;
    if looks_like_html(&text) {
        return Err(AppError::ServerMisconfigured {
            server: server.to_string(),
            status: status.as_u16(),
        });
    }
    if status != StatusCode::OK {
        return Err(AppError::Server {
            status: status.as_u16(),
            body: crate::utils::http::truncate_body(
                &text,
                crate::constants::MAX_ERROR_BODY_BYTES,
            ),
        });
    }
    Ok(serde_json::from_str(&text)?)
}
