use crate::constants::LICENSE_FILE;
use crate::error::AppResult;
use crate::modules::system::registry::Service;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Local activation status consulted before marketplace authentication.
pub trait LicenseProvider: Send + Sync {
    fn is_activated(&self) -> bool;

    fn serial_number(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalLicense {
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub activated: bool,
}

/// Loads `license.json` at startup. A missing file means "not activated"; an unreadable or
/// malformed file fails initialization.
pub struct LicenseService {
    path: PathBuf,
    state: RwLock<LocalLicense>,
}

impl LicenseService {
    pub const NAME: &'static str = "license";

    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(LICENSE_FILE),
            state: RwLock::new(LocalLicense::default()),
        }
    }

    pub fn current(&self) -> LocalLicense {
        self.state.read().clone()
    }

    async fn load(&self) -> AppResult<()> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No local license at {:?}; running unactivated", self.path);
                *self.state.write() = LocalLicense::default();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let license: LocalLicense = serde_json::from_str(&content)?;
        tracing::info!(
            "Local license loaded (activated: {})",
            license.activated && !license.serial_number.trim().is_empty()
        );
        *self.state.write() = license;
        Ok(())
    }
}

impl LicenseProvider for LicenseService {
    fn is_activated(&self) -> bool {
        let state = self.state.read();
        state.activated && !state.serial_number.trim().is_empty()
    }

    fn serial_number(&self) -> Option<String> {
        let sn = self.state.read().serial_number.trim().to_string();
        (!sn.is_empty()).then_some(sn)
    }
}

impl Service for LicenseService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&self) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(self.load())
    }

    fn shutdown(&self) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::fs;

    fn temp_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("packledger-license-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_file_means_not_activated() {
        let dir = temp_dir();
        let service = LicenseService::new(&dir);
        service.initialize().await.unwrap();
        assert!(!service.is_activated());
        assert_eq!(service.serial_number(), None);
        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn activated_license_exposes_serial() {
        let dir = temp_dir();
        fs::write(
            dir.join(LICENSE_FILE),
            r#"{"serial_number":" SN-1234 ","activated":true}"#,
        )
        .unwrap();
        let service = LicenseService::new(&dir);
        service.initialize().await.unwrap();
        assert!(service.is_activated());
        assert_eq!(service.serial_number().as_deref(), Some("SN-1234"));
        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn corrupt_file_fails_initialization() {
        let dir = temp_dir();
        fs::write(dir.join(LICENSE_FILE), "{serial").unwrap();
        let service = LicenseService::new(&dir);
        let err = service.initialize().await.unwrap_err();
        assert!(matches!(err, AppError::Json(_)));
        let _ = fs::remove_dir_all(dir);
    }
}
