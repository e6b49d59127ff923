pub mod catalog;
pub mod config;
pub mod license;
pub mod usage;

pub use catalog::{
    MyPublishedPackInfo, NotificationInfo, PackCategory, PackListingInfo, PurchasedPackInfo,
};
pub use config::AppConfig;
pub use license::{now_rfc3339, Permission, PricingModel, UsageLicense};
pub use usage::{PendingUsageRecord, ReportPackUsageResponse};
