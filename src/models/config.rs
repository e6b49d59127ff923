use crate::constants::{
    DEFAULT_LICENSE_SERVER_URL, DEFAULT_MARKETPLACE_SERVER_URL, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SHARE_BASE_URL,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Account email sent with the serial number during marketplace authentication.
    #[serde(default)]
    pub license_email: String,
    /// Where downloaded packs are cached. Empty means `<data_dir>/cache`.
    #[serde(default)]
    pub data_cache_dir: String,
    #[serde(default = "default_marketplace_server_url")]
    pub marketplace_server_url: String,
    #[serde(default = "default_license_server_url")]
    pub license_server_url: String,
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_marketplace_server_url() -> String {
    DEFAULT_MARKETPLACE_SERVER_URL.to_string()
}

fn default_license_server_url() -> String {
    DEFAULT_LICENSE_SERVER_URL.to_string()
}

fn default_share_base_url() -> String {
    DEFAULT_SHARE_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            license_email: String::new(),
            data_cache_dir: String::new(),
            marketplace_server_url: default_marketplace_server_url(),
            license_server_url: default_license_server_url(),
            share_base_url: default_share_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}
