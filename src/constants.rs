use std::sync::LazyLock;

pub const DEFAULT_MARKETPLACE_SERVER_URL: &str = "http://localhost:8090";
pub const DEFAULT_LICENSE_SERVER_URL: &str = "https://license.vantagics.com";
pub const DEFAULT_SHARE_BASE_URL: &str = "https://market.vantagics.com";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Upload and download cap for pack archives.
pub const MAX_PACK_SIZE_BYTES: u64 = 500 * 1024 * 1024;

/// Error bodies are truncated to this many bytes before they land in an error message.
pub const MAX_ERROR_BODY_BYTES: usize = 1024;

pub const PENDING_USAGE_FILE: &str = "pending_usage_reports.json";
pub const USAGE_LICENSE_FILE: &str = "marketplace_licenses.json";
pub const PACK_PASSWORD_FILE: &str = "pack_passwords.json";
pub const LICENSE_FILE: &str = "license.json";

pub const ENCRYPTION_PASSWORD_HEADER: &str = "X-Encryption-Password";
pub const USAGE_LICENSE_HEADER: &str = "X-Usage-License";

pub static USER_AGENT: LazyLock<String> = LazyLock::new(|| {
    format!(
        "packledger/{} {}/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
});
