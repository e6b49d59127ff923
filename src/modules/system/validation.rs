use crate::models::AppConfig;
use std::fmt;

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
    pub actual_value: Option<String>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual_value {
            Some(val) => write!(f, "  • {}: {} (got: {})", self.field, self.message, val),
            None => write!(f, "  • {}: {}", self.field, self.message),
        }
    }
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            actual_value: None,
        }
    }

    fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            actual_value: Some(value.to_string()),
        }
    }
}

pub fn validate_app_config(config: &AppConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_server_url(
        "marketplace_server_url",
        &config.marketplace_server_url,
        &mut errors,
    );
    validate_server_url(
        "license_server_url",
        &config.license_server_url,
        &mut errors,
    );
    validate_server_url("share_base_url", &config.share_base_url, &mut errors);

    if config.request_timeout_secs == 0 {
        errors.push(ConfigError::with_value(
            "request_timeout_secs",
            "must be greater than 0",
            config.request_timeout_secs,
        ));
    } else if config.request_timeout_secs > 600 {
        errors.push(ConfigError::with_value(
            "request_timeout_secs",
            "should not exceed 600 seconds (10 minutes)",
            config.request_timeout_secs,
        ));
    }

    let email = config.license_email.trim();
    if !email.is_empty() && !looks_like_email(email) {
        errors.push(ConfigError::with_value(
            "license_email",
            "must be a valid email address",
            email,
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_server_url(field: &str, value: &str, errors: &mut Vec<ConfigError>) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(ConfigError::new(field, "must not be empty"));
        return;
    }
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
            if parsed.host_str().is_none() {
                errors.push(ConfigError::with_value(field, "must include a host", value));
            }
        }
        Ok(_) => errors.push(ConfigError::with_value(
            field,
            "must use http:// or https://",
            value,
        )),
        Err(_) => errors.push(ConfigError::with_value(
            field,
            "must be a valid URL (e.g. https://market.example.com)",
            value,
        )),
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}
