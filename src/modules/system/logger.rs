use crate::modules::system::config::get_data_dir;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "packledger.log";

struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(w, "{}", now.to_rfc3339())
    }
}

pub fn get_log_dir() -> Result<PathBuf, String> {
    let log_dir = get_data_dir()?.join("logs");

    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)
            .map_err(|e| format!("Failed to create log directory: {}", e))?;
    }

    Ok(log_dir)
}

/// Installs the global subscriber: console plus a daily-rolling file under `<data_dir>/logs`.
///
/// The returned guard flushes the file writer on drop and must be held for the process lifetime.
pub fn init_logger() -> Option<WorkerGuard> {
    let _ = tracing_log::LogTracer::init();

    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_timer(LocalTimer);

    let log_dir = match get_log_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Failed to initialize log directory: {}", e);
            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(console_layer)
                .try_init();
            return None;
        }
    };

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::Layer::new()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_timer(LocalTimer);
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    info!("Log system initialized (Console + File persistence)");
    if let Err(e) = cleanup_old_logs(7) {
        warn!("Failed to cleanup old logs: {}", e);
    }
    Some(guard)
}

pub fn cleanup_old_logs(days_to_keep: u64) -> Result<(), String> {
    cleanup_logs_in(&get_log_dir()?, days_to_keep)
}

fn cleanup_logs_in(log_dir: &std::path::Path, days_to_keep: u64) -> Result<(), String> {
    use std::time::{SystemTime, UNIX_EPOCH};

    if !log_dir.exists() {
        return Ok(());
    }
    const MAX_TOTAL_SIZE_BYTES: u64 = 1024 * 1024 * 1024;
    const TARGET_SIZE_BYTES: u64 = 512 * 1024 * 1024;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Failed to get system time: {}", e))?
        .as_secs();
    let cutoff_time = now.saturating_sub(days_to_keep * 24 * 60 * 60);

    let mut entries_info = Vec::new();
    let entries =
        fs::read_dir(log_dir).map_err(|e| format!("Failed to read log directory: {}", e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Ok(metadata) = fs::metadata(&path) {
            let modified_secs = metadata
                .modified()
                .ok()
                .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(now);
            entries_info.push((path, metadata.len(), modified_secs));
        }
    }

    let (expired, mut remaining): (Vec<_>, Vec<_>) = entries_info
        .into_iter()
        .partition(|(_, _, modified)| *modified < cutoff_time);

    let mut deleted_count = 0;
    let mut total_size_freed = 0u64;
    for (path, size, modified) in expired {
        match fs::remove_file(&path) {
            Ok(()) => {
                deleted_count += 1;
                total_size_freed += size;
            }
            Err(e) => {
                warn!("Failed to delete old log file {:?}: {}", path, e);
                remaining.push((path, size, modified));
            }
        }
    }

    let mut current_total_size: u64 = remaining.iter().map(|(_, size, _)| *size).sum();
    if current_total_size > MAX_TOTAL_SIZE_BYTES {
        remaining.sort_by_key(|(_, _, modified)| *modified);
        for (path, size, _) in remaining {
            if current_total_size <= TARGET_SIZE_BYTES {
                break;
            }
            if fs::remove_file(&path).is_ok() {
                deleted_count += 1;
                total_size_freed += size;
                current_total_size -= size;
            }
        }
    }

    if deleted_count > 0 {
        info!(
            "Log cleanup completed: deleted {} files, freed {:.2} MB",
            deleted_count,
            total_size_freed as f64 / 1024.0 / 1024.0
        );
    }
    Ok(())
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_warn(message: &str) {
    warn!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Single-string logging sink handed to the registry and the marketplace facade.
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);

    fn warn(&self, message: &str) {
        self.info(message);
    }

    fn error(&self, message: &str) {
        self.info(message);
    }
}

/// Forwards to the global `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn info(&self, message: &str) {
        log_info(message);
    }

    fn warn(&self, message: &str) {
        log_warn(message);
    }

    fn error(&self, message: &str) {
        log_error(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingSink;

    #[test]
    fn sink_defaults_route_to_info() {
        struct InfoOnly(RecordingSink);
        impl LogSink for InfoOnly {
            fn info(&self, message: &str) {
                self.0.info(message);
            }
        }

        let sink = InfoOnly(RecordingSink::default());
        sink.warn("w");
        sink.error("e");
        assert_eq!(sink.0.lines(), vec!["INFO w", "INFO e"]);
    }

    #[test]
    fn cleanup_keeps_recent_files() {
        let dir = std::env::temp_dir().join(format!("packledger-logs-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("packledger.log.2026-10-01"), "recent").unwrap();

        cleanup_logs_in(&dir, 7).unwrap();

        assert!(dir.join("packledger.log.2026-10-01").exists());
        let _ = fs::remove_dir_all(dir);
    }
}
