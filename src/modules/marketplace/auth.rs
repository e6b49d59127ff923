use super::client::decode_auth_response;
use super::service::MarketplaceService;
use crate::error::{AppError, AppResult};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct MarketplaceAuthRequest<'a> {
    sn: &'a str,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct MarketplaceAuthResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct SnLoginRequest<'a> {
    license_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct SnLoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: String,
    #[serde(default)]
    login_ticket: String,
    #[serde(default)]
    message: String,
}

impl MarketplaceService {
    /// Step one: trade the local serial number and account email for a license-server token.
    async fn request_license_token(&self) -> AppResult<String> {
        if !self.license.is_activated() {
            return Err(AppError::Auth("license is not activated".to_string()));
        }
        let sn = self
            .license
            .serial_number()
            .ok_or_else(|| AppError::Auth("license has no serial number".to_string()))?;
        let config = self.config.get_config()?;
        let email = config.license_email.trim();
        if email.is_empty() {
            return Err(AppError::Auth("license email is not configured".to_string()));
        }

        let response = self
            .client
            .http()
            .post(self.client.license_endpoint("/api/marketplace-auth"))
            .json(&MarketplaceAuthRequest { sn: &sn, email })
            .send()
            .await?;
        let auth: MarketplaceAuthResponse =
            decode_auth_response(response, "license server").await?;

        if !auth.success {
            return Err(AppError::Auth(format!(
                "authentication rejected: {} ({})",
                auth.message, auth.code
            )));
        }
        if auth.token.is_empty() {
            return Err(AppError::Auth(
                "license server returned an empty token".to_string(),
            ));
        }
        Ok(auth.token)
    }

    /// Step two: exchange the license token for a marketplace session.
    async fn sn_login(&self, license_token: &str) -> AppResult<SnLoginResponse> {
        let response = self
            .client
            .http()
            .post(self.client.endpoint("/api/auth/sn-login"))
            .json(&SnLoginRequest { license_token })
            .send()
            .await?;
        let login: SnLoginResponse = decode_auth_response(response, "marketplace server").await?;
        if !login.success {
            return Err(AppError::Auth(format!(
                "marketplace login failed: {}",
                login.message
            )));
        }
        Ok(login)
    }

    /// Runs the full two-step exchange and caches the marketplace token.
    pub async fn login_with_sn(&self) -> AppResult<()> {
        let license_token = self.request_license_token().await?;
        let login = self.sn_login(&license_token).await?;
        if login.token.is_empty() {
            return Err(AppError::Auth(
                "marketplace returned an empty token".to_string(),
            ));
        }
        self.client.set_token(login.token);
        self.sink.info("Marketplace login succeeded");
        Ok(())
    }

    /// No-op when a token is cached; concurrent callers share a single exchange.
    pub async fn ensure_auth(&self) -> AppResult<()> {
        if self.client.has_token() {
            return Ok(());
        }
        let _guard = self.auth_lock.lock().await;
        if self.client.has_token() {
            return Ok(());
        }
        self.login_with_sn().await
    }

    pub fn is_logged_in(&self) -> bool {
        self.client.has_token()
    }

    pub fn logout(&self) {
        self.client.clear_token();
    }

    /// Performs the exchange and returns the user-portal ticket login URL.
    pub async fn portal_login(&self) -> AppResult<String> {
        let license_token = self.request_license_token().await?;
        let login = self.sn_login(&license_token).await?;
        if !login.token.is_empty() {
            self.client.set_token(login.token);
        }
        if login.login_ticket.is_empty() {
            return Err(AppError::Auth(
                "marketplace returned no login ticket".to_string(),
            ));
        }
        let mut url = url::Url::parse(&self.client.endpoint("/user/ticket-login"))
            .map_err(|e| AppError::Config(format!("invalid marketplace URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("ticket", &login.login_ticket);
        Ok(url.to_string())
    }

    /// User id from the cached token, if it can be read.
    pub(super) fn current_user_id(&self) -> Option<i64> {
        self.client
            .token()
            .and_then(|token| decode_unverified_user_id(&token))
    }
}

/// Reads `user_id` from the payload segment of a JWT-shaped token WITHOUT checking its
/// signature. Only fit for filtering the caller's own listings; the server enforces access.
pub fn decode_unverified_user_id(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let user_id = match claims.get("user_id")? {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    (user_id != 0).then_some(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(payload: &str) -> String {
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload);
        format!("header.{}.signature", encoded)
    }

    #[test]
    fn decodes_numeric_and_string_user_ids() {
        assert_eq!(
            decode_unverified_user_id(&token_with(r#"{"user_id":42}"#)),
            Some(42)
        );
        assert_eq!(
            decode_unverified_user_id(&token_with(r#"{"user_id":"17","exp":1}"#)),
            Some(17)
        );
    }

    #[test]
    fn rejects_unreadable_tokens() {
        assert_eq!(decode_unverified_user_id("opaque-token"), None);
        assert_eq!(decode_unverified_user_id("a.!!!.c"), None);
        assert_eq!(decode_unverified_user_id(&token_with("not json")), None);
        assert_eq!(decode_unverified_user_id(&token_with(r#"{"user_id":0}"#)), None);
        assert_eq!(decode_unverified_user_id(&token_with(r#"{"sub":"x"}"#)), None);
    }
}
