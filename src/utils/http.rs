use reqwest::Client;
use std::time::Duration;

/// Builds the HTTP client used for every marketplace and license-server call.
///
/// The timeout applies per request; there is no end-to-end cancellation above it.
pub fn create_client(timeout_secs: u64) -> Client {
    let timeout_secs = timeout_secs.clamp(1, 600);
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.min(15)))
        .user_agent(crate::constants::USER_AGENT.as_str())
        .build()
        .unwrap_or_else(|e| {
            tracing::error!("failed_to_build_http_client: {}, using defaults", e);
            Client::new()
        })
}

/// Reads a response body for an error message, truncated on a char boundary.
pub async fn read_error_body(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    truncate_body(&text, crate::constants::MAX_ERROR_BODY_BYTES)
}

pub fn truncate_body(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// True when a body looks like an HTML page rather than JSON.
pub fn looks_like_html(body: &str) -> bool {
    body.trim_start().starts_with('<')
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::get, Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    #[test]
    fn truncate_body_respects_char_boundaries() {
        assert_eq!(truncate_body("short", 10), "short");
        assert_eq!(truncate_body("abcdef", 3), "abc...");
        // 'é' is two bytes; cutting at 2 would split it
        assert_eq!(truncate_body("aébc", 2), "a...");
    }

    #[test]
    fn detects_html_bodies() {
        assert!(looks_like_html("<!DOCTYPE html><html></html>"));
        assert!(looks_like_html("  \n<html>"));
        assert!(!looks_like_html("{\"success\":true}"));
        assert!(!looks_like_html(""));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn client_sends_default_user_agent() {
        let app = Router::new().route(
            "/ua",
            get(|headers: HeaderMap| async move {
                let ua = headers
                    .get(reqwest::header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "ua": ua }))
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let body: serde_json::Value = create_client(5)
            .get(format!("http://{}/ua", addr))
            .send()
            .await
            .expect("request")
            .json()
            .await
            .expect("json");
        server.abort();

        assert_eq!(body["ua"], crate::constants::USER_AGENT.as_str());
    }
}
