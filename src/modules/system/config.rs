use crate::error::{AppError, AppResult};
use crate::models::AppConfig;
use crate::modules::persistence::json_file::write_json_atomic;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CONFIG_FILE: &str = "config.json";
const DATA_DIR: &str = ".packledger";

pub const DATA_DIR_ENV: &str = "PACKLEDGER_DATA_DIR";
pub const MARKETPLACE_URL_ENV: &str = "PACKLEDGER_MARKETPLACE_URL";
pub const LICENSE_SERVER_URL_ENV: &str = "PACKLEDGER_LICENSE_SERVER_URL";
pub const LICENSE_EMAIL_ENV: &str = "PACKLEDGER_LICENSE_EMAIL";

pub fn get_data_dir() -> Result<PathBuf, String> {
    fn ensure_dir(path: &PathBuf) -> Result<(), String> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| format!("failed_to_create_data_dir: {}", e))?;
        }
        Ok(())
    }
    if let Ok(env_path) = std::env::var(DATA_DIR_ENV) {
        if !env_path.trim().is_empty() {
            let data_dir = PathBuf::from(env_path);
            ensure_dir(&data_dir)?;
            return Ok(data_dir);
        }
    }
    if cfg!(test) {
        let data_dir =
            std::env::temp_dir().join(format!(".packledger-test-{}", std::process::id()));
        ensure_dir(&data_dir)?;
        return Ok(data_dir);
    }

    if let Some(home) = dirs::home_dir() {
        let data_dir = home.join(DATA_DIR);
        if ensure_dir(&data_dir).is_ok() {
            return Ok(data_dir);
        }
    }
    let fallback_dir = std::env::temp_dir().join(DATA_DIR);
    ensure_dir(&fallback_dir)?;
    Ok(fallback_dir)
}

pub fn load_app_config() -> Result<AppConfig, String> {
    load_app_config_in(&get_data_dir()?)
}

/// Reads `config.json` from `data_dir`, writing defaults when the file is absent.
pub fn load_app_config_in(data_dir: &Path) -> Result<AppConfig, String> {
    let config_path = data_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        let config = AppConfig::new();
        if let Err(e) = save_app_config_in(data_dir, &config) {
            warn!("Failed to write default config: {}", e);
        }
        return Ok(config);
    }

    let content = fs::read_to_string(&config_path)
        .map_err(|e| format!("failed_to_read_config_file: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("failed_to_parse_config_file: {}", e))
}

pub fn save_app_config(config: &AppConfig) -> Result<(), String> {
    save_app_config_in(&get_data_dir()?, config)
}

pub fn save_app_config_in(data_dir: &Path, config: &AppConfig) -> Result<(), String> {
    write_json_atomic(&data_dir.join(CONFIG_FILE), config)
        .map_err(|e| format!("failed_to_save_config: {}", e))
}

pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = std::env::var(MARKETPLACE_URL_ENV) {
        if !url.trim().is_empty() {
            info!("Using marketplace server URL from environment");
            config.marketplace_server_url = url.trim().to_string();
        }
    }

    if let Ok(url) = std::env::var(LICENSE_SERVER_URL_ENV) {
        if !url.trim().is_empty() {
            info!("Using license server URL from environment");
            config.license_server_url = url.trim().to_string();
        }
    }

    if let Ok(email) = std::env::var(LICENSE_EMAIL_ENV) {
        if !email.trim().is_empty() {
            info!("Using license email from environment");
            config.license_email = email.trim().to_string();
        }
    }
}

/// Read-only access to the current application configuration.
pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> AppResult<AppConfig>;
}

/// Re-reads `config.json` on every call so edits take effect without a restart.
pub struct FileConfigProvider {
    data_dir: PathBuf,
}

impl FileConfigProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

impl ConfigProvider for FileConfigProvider {
    fn get_config(&self) -> AppResult<AppConfig> {
        let mut config = load_app_config_in(&self.data_dir).map_err(AppError::Config)?;
        apply_env_overrides(&mut config);
        Ok(config)
    }
}

impl ConfigProvider for AppConfig {
    fn get_config(&self) -> AppResult<AppConfig> {
        Ok(self.clone())
    }
}
