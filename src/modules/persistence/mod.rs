pub mod json_file;
pub mod pack_password_store;
pub mod pending_usage_queue;
pub mod usage_license_store;

pub use pack_password_store::PackPasswordStore;
pub use pending_usage_queue::PendingUsageQueue;
pub use usage_license_store::UsageLicenseStore;
