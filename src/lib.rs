pub mod constants;
pub mod error;
pub mod models;
pub mod modules;
mod test_utils;
pub mod utils;

use error::{AppError, AppResult};
use modules::marketplace::MarketplaceService;
use modules::system::config::{self, FileConfigProvider};
use modules::system::license::LicenseService;
use modules::system::logger::{self, LogSink, TracingSink};
use modules::system::registry::ServiceRegistry;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything the application root owns after a successful startup.
pub struct AppRuntime {
    pub registry: ServiceRegistry,
    pub license: Arc<LicenseService>,
    pub marketplace: Arc<MarketplaceService>,
}

impl AppRuntime {
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
    }
}

fn load_validated_config(data_dir: &Path) -> AppResult<models::AppConfig> {
    let mut config = config::load_app_config_in(data_dir).map_err(AppError::Config)?;
    config::apply_env_overrides(&mut config);
    modules::system::validation::validate_app_config(&config).map_err(|errors| {
        AppError::Config(format!(
            "configuration_validation_failed:\n{}",
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        ))
    })?;
    Ok(config)
}

/// Wires the services under `data_dir` and initializes them in order.
///
/// The license service is critical; the marketplace facade runs degraded if its stores fail.
pub async fn bootstrap(data_dir: &Path, sink: Arc<dyn LogSink>) -> AppResult<AppRuntime> {
    let config = load_validated_config(data_dir)?;
    info!(
        "Marketplace server: {}, license server: {}",
        config.marketplace_server_url, config.license_server_url
    );

    let license = Arc::new(LicenseService::new(data_dir));
    let marketplace = Arc::new(MarketplaceService::new(
        data_dir,
        Arc::new(FileConfigProvider::new(data_dir)),
        license.clone(),
        sink.clone(),
    )?);

    let registry = ServiceRegistry::new(sink);
    registry.register_critical(license.clone())?;
    registry.register(marketplace.clone())?;
    registry.initialize_all().await?;

    Ok(AppRuntime {
        registry,
        license,
        marketplace,
    })
}

pub fn run() {
    let _log_guard = logger::init_logger();

    let data_dir = match config::get_data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            error!("Failed to resolve data directory: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let exit_code = runtime.block_on(async {
        let app = match bootstrap(&data_dir, Arc::new(TracingSink)).await {
            Ok(app) => app,
            Err(e) => {
                error!("Startup failed: {}", e);
                return 1;
            }
        };

        info!("packledger is running. Press Ctrl+C to exit.");
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Shutting down");
        app.shutdown().await;
        0
    });

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
