use super::client::MarketplaceClient;
use crate::error::{AppError, AppResult};
use crate::modules::persistence::{PackPasswordStore, PendingUsageQueue, UsageLicenseStore};
use crate::modules::system::config::ConfigProvider;
use crate::modules::system::license::LicenseProvider;
use crate::modules::system::logger::LogSink;
use crate::modules::system::registry::Service;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const STARTUP_FLUSH_NOTICE: Duration = Duration::from_secs(5);

#[derive(Default)]
struct BackgroundTasks {
    shutting_down: AtomicBool,
    startup_flush: Mutex<Option<JoinHandle<()>>>,
    validations: Mutex<Vec<JoinHandle<()>>>,
}

/// Marketplace facade: authentication, catalog, publishing, purchasing, and offline-resilient
/// usage reporting over the three local stores.
///
/// Cloning is cheap; every clone shares the same client, stores and locks.
#[derive(Clone)]
pub struct MarketplaceService {
    pub(super) config: Arc<dyn ConfigProvider>,
    pub(super) license: Arc<dyn LicenseProvider>,
    pub(super) sink: Arc<dyn LogSink>,
    pub(super) client: Arc<MarketplaceClient>,
    pub(super) pending: Arc<PendingUsageQueue>,
    pub(super) licenses: Arc<UsageLicenseStore>,
    pub(super) passwords: Arc<PackPasswordStore>,
    pub(super) flush_lock: Arc<tokio::sync::Mutex<()>>,
    pub(super) auth_lock: Arc<tokio::sync::Mutex<()>>,
    data_dir: PathBuf,
    tasks: Arc<BackgroundTasks>,
}

impl MarketplaceService {
    pub const NAME: &'static str = "marketplace";

    /// Builds the facade with stores under `data_dir`. Stores stay empty until `initialize`.
    pub fn new(
        data_dir: &Path,
        config: Arc<dyn ConfigProvider>,
        license: Arc<dyn LicenseProvider>,
        sink: Arc<dyn LogSink>,
    ) -> AppResult<Self> {
        let client = MarketplaceClient::from_config(&config.get_config()?);
        Ok(Self {
            config,
            license,
            sink,
            client: Arc::new(client),
            pending: Arc::new(PendingUsageQueue::new(data_dir)),
            licenses: Arc::new(UsageLicenseStore::new(data_dir)),
            passwords: Arc::new(PackPasswordStore::new(data_dir)),
            flush_lock: Arc::new(tokio::sync::Mutex::new(())),
            auth_lock: Arc::new(tokio::sync::Mutex::new(())),
            data_dir: data_dir.to_path_buf(),
            tasks: Arc::new(BackgroundTasks::default()),
        })
    }

    pub fn client(&self) -> &MarketplaceClient {
        &self.client
    }

    pub fn pending_queue(&self) -> &PendingUsageQueue {
        &self.pending
    }

    pub fn license_store(&self) -> &UsageLicenseStore {
        &self.licenses
    }

    pub fn password_store(&self) -> &PackPasswordStore {
        &self.passwords
    }

    /// `<data_cache_dir>/qap`, with the cache dir defaulting to `<data_dir>/cache`.
    pub(super) fn qap_dir(&self) -> AppResult<PathBuf> {
        let config = self.config.get_config()?;
        let cache_dir = config.data_cache_dir.trim();
        let base = if cache_dir.is_empty() {
            self.data_dir.join("cache")
        } else {
            PathBuf::from(cache_dir)
        };
        Ok(base.join("qap"))
    }

    /// Spawns a task onto the current runtime and keeps its handle for shutdown.
    pub(super) fn spawn_validation<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.sink
                .warn("No async runtime available; background license validation skipped");
            return;
        };
        let mut validations = self.tasks.validations.lock();
        validations.retain(|h| !h.is_finished());
        validations.push(handle.spawn(task));
    }

    /// Set once `shutdown` starts. Flushes stop between records, never mid-report.
    pub(super) fn is_shutting_down(&self) -> bool {
        self.tasks.shutting_down.load(Ordering::SeqCst)
    }

    fn load_stores(&self) -> AppResult<()> {
        let mut first_error: Option<AppError> = None;
        let results = [
            ("usage licenses", self.licenses.load()),
            ("pending usage queue", self.pending.load()),
            ("pack passwords", self.passwords.load()),
        ];
        for (store, result) in results {
            match result {
                Ok(()) => self.sink.info(&format!("Loaded {}", store)),
                Err(e) => {
                    self.sink
                        .error(&format!("Failed to load {}: {}", store, e));
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn start(&self) -> AppResult<()> {
        let loaded = self.load_stores();

        let this = self.clone();
        let flush = tokio::spawn(async move {
            let summary = this.flush_pending_usage_reports().await;
            if summary.attempted > 0 {
                this.sink.info(&format!("Startup usage flush: {}", summary));
            }
        });
        *self.tasks.startup_flush.lock() = Some(flush);

        self.sink.info(&format!(
            "Marketplace service initialized ({} pending usage reports, {} licenses)",
            self.pending.len(),
            self.licenses.len()
        ));
        loaded
    }

    async fn stop(&self) -> AppResult<()> {
        self.tasks.shutting_down.store(true, Ordering::SeqCst);

        // Never abort the flush: its in-flight record is already dequeued. The request timeout
        // bounds the wait.
        let startup_flush = self.tasks.startup_flush.lock().take();
        if let Some(mut handle) = startup_flush {
            if tokio::time::timeout(STARTUP_FLUSH_NOTICE, &mut handle)
                .await
                .is_err()
            {
                self.sink
                    .info("Waiting for the in-flight usage report before shutting down");
                if let Err(e) = handle.await {
                    self.sink
                        .warn(&format!("Startup usage flush ended abnormally: {}", e));
                }
            }
        }

        let validations: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.tasks.validations.lock());
        for handle in validations {
            handle.abort();
        }

        self.sink.info("Marketplace service shut down");
        Ok(())
    }
}

impl Service for MarketplaceService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&self) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(self.start())
    }

    fn shutdown(&self) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(self.stop())
    }
}
