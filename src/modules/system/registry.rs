use crate::error::{AppError, AppResult};
use crate::modules::system::logger::LogSink;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

const REGISTRY: &str = "ServiceRegistry";

/// Lifecycle contract for everything the registry boots and tears down.
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    fn initialize(&self) -> BoxFuture<'_, AppResult<()>>;

    fn shutdown(&self) -> BoxFuture<'_, AppResult<()>>;
}

#[derive(Clone)]
struct ServiceEntry {
    name: String,
    critical: bool,
    service: Arc<dyn Service>,
}

#[derive(Default)]
struct RegistryState {
    ordered: Vec<ServiceEntry>,
    by_name: HashMap<String, Arc<dyn Service>>,
}

/// Boots services in registration order and stops them in reverse.
///
/// A critical service that fails to initialize aborts startup; any other failure leaves the
/// application running in a degraded state.
pub struct ServiceRegistry {
    sink: Arc<dyn LogSink>,
    state: RwLock<RegistryState>,
}

impl ServiceRegistry {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn register(&self, service: Arc<dyn Service>) -> AppResult<()> {
        self.insert(service, false)
    }

    pub fn register_critical(&self, service: Arc<dyn Service>) -> AppResult<()> {
        self.insert(service, true)
    }

    fn insert(&self, service: Arc<dyn Service>, critical: bool) -> AppResult<()> {
        let name = service.name().to_string();
        let mut state = self.state.write();
        if state.by_name.contains_key(&name) {
            return Err(AppError::wrap(
                REGISTRY,
                "register",
                AppError::Validation(format!("service {:?} already registered", name)),
            ));
        }
        state.by_name.insert(name.clone(), service.clone());
        state.ordered.push(ServiceEntry {
            name,
            critical,
            service,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.state.read().by_name.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.state
            .read()
            .ordered
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn is_critical(&self, name: &str) -> Option<bool> {
        self.state
            .read()
            .ordered
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.critical)
    }

    fn snapshot(&self) -> Vec<ServiceEntry> {
        self.state.read().ordered.clone()
    }

    pub async fn initialize_all(&self) -> AppResult<()> {
        for entry in self.snapshot() {
            let Err(e) = entry.service.initialize().await else {
                continue;
            };
            if entry.critical {
                self.sink.error(&format!(
                    "Critical service {:?} failed to initialize: {}",
                    entry.name, e
                ));
                return Err(AppError::wrap(
                    REGISTRY,
                    "initialize_all",
                    AppError::wrap(&entry.name, "initialize", e),
                ));
            }
            self.sink.warn(&format!(
                "Non-critical service {:?} failed to initialize (degraded): {}",
                entry.name, e
            ));
        }
        Ok(())
    }

    /// Shuts every service down in reverse registration order. Errors are logged, never returned.
    pub async fn shutdown_all(&self) {
        for entry in self.snapshot().into_iter().rev() {
            if let Err(e) = entry.service.shutdown().await {
                self.sink
                    .warn(&format!("Service {:?} shutdown error: {}", entry.name, e));
            }
        }
    }
}
