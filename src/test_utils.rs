#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(test)]
fn global_env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

#[cfg(test)]
pub(crate) fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    global_env_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
pub(crate) struct ScopedEnvVar {
    key: &'static str,
    original: Option<String>,
}

#[cfg(test)]
impl ScopedEnvVar {
    pub(crate) fn set(key: &'static str, value: &str) -> Self {
        let original = std::env::var(key).ok();
        std::env::set_var(key, value);
        Self { key, original }
    }

    pub(crate) fn unset(key: &'static str) -> Self {
        let original = std::env::var(key).ok();
        std::env::remove_var(key);
        Self { key, original }
    }
}

#[cfg(test)]
impl Drop for ScopedEnvVar {
    fn drop(&mut self) {
        if let Some(value) = self.original.as_deref() {
            std::env::set_var(self.key, value);
        } else {
            std::env::remove_var(self.key);
        }
    }
}

/// Captures sink output as `"<LEVEL> <message>"` lines.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSink {
    lines: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(needle))
    }
}

#[cfg(test)]
impl crate::modules::system::logger::LogSink for RecordingSink {
    fn info(&self, message: &str) {
        self.lines.lock().push(format!("INFO {}", message));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().push(format!("WARN {}", message));
    }

    fn error(&self, message: &str) {
        self.lines.lock().push(format!("ERROR {}", message));
    }
}

/// Fixed license state for tests.
#[cfg(test)]
pub(crate) struct StaticLicense {
    pub(crate) activated: bool,
    pub(crate) serial_number: String,
}

#[cfg(test)]
impl StaticLicense {
    pub(crate) fn activated(serial_number: &str) -> Self {
        Self {
            activated: true,
            serial_number: serial_number.to_string(),
        }
    }
}

#[cfg(test)]
impl crate::modules::system::license::LicenseProvider for StaticLicense {
    fn is_activated(&self) -> bool {
        self.activated
    }

    fn serial_number(&self) -> Option<String> {
        if self.serial_number.is_empty() {
            None
        } else {
            Some(self.serial_number.clone())
        }
    }
}
