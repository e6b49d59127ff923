pub mod config;
pub mod license;
pub mod logger;
pub mod registry;
pub mod validation;
