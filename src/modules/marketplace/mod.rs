pub mod auth;
pub mod catalog;
pub mod client;
pub mod publish;
pub mod purchase;
pub mod service;
pub mod usage;


pub use auth::decode_unverified_user_id;
pub use client::MarketplaceClient;
pub use service::MarketplaceService;
pub use usage::FlushSummary;
