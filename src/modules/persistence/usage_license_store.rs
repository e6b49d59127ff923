use super::json_file::{read_json_or_default, write_json_atomic};
use crate::constants::USAGE_LICENSE_FILE;
use crate::error::AppResult;
use crate::models::{Permission, PricingModel, UsageLicense};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LicenseFile {
    #[serde(default)]
    licenses: BTreeMap<i64, UsageLicense>,
}

/// Local cache of per-listing entitlements, keyed by listing id.
///
/// Mutators only touch memory; callers `save` after each server-driven change.
pub struct UsageLicenseStore {
    path: PathBuf,
    licenses: RwLock<HashMap<i64, UsageLicense>>,
}

impl UsageLicenseStore {
    pub fn new(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(USAGE_LICENSE_FILE))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            licenses: RwLock::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AppResult<()> {
        let file: LicenseFile = read_json_or_default(&self.path)?;
        *self.licenses.write() = file.licenses.into_iter().collect();
        Ok(())
    }

    pub fn save(&self) -> AppResult<()> {
        let licenses = self.licenses.read();
        let file = LicenseFile {
            licenses: licenses
                .iter()
                .map(|(id, lic)| (*id, lic.clone()))
                .collect(),
        };
        write_json_atomic(&self.path, &file)
    }

    pub fn get_license(&self, listing_id: i64) -> Option<UsageLicense> {
        self.licenses.read().get(&listing_id).cloned()
    }

    pub fn set_license(&self, license: UsageLicense) {
        self.licenses.write().insert(license.listing_id, license);
    }

    /// Applies `f` to the stored license under the write lock. Returns false if absent.
    pub fn update_license<F>(&self, listing_id: i64, f: F) -> bool
    where
        F: FnOnce(&mut UsageLicense),
    {
        match self.licenses.write().get_mut(&listing_id) {
            Some(license) => {
                f(license);
                true
            }
            None => false,
        }
    }

    pub fn delete_license(&self, listing_id: i64) -> Option<UsageLicense> {
        self.licenses.write().remove(&listing_id)
    }

    pub fn get_all_licenses(&self) -> Vec<UsageLicense> {
        let mut all: Vec<UsageLicense> = self.licenses.read().values().cloned().collect();
        all.sort_by_key(|lic| lic.listing_id);
        all
    }

    pub fn len(&self) -> usize {
        self.licenses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.licenses.read().is_empty()
    }

    /// Local gate before running a pack.
    ///
    /// Unknown listings are allowed (free or not yet synced). Subscriptions are allowed until
    /// the cached `blocked` flag says otherwise; background validation refreshes it.
    pub fn check_permission(&self, listing_id: i64) -> Permission {
        let licenses = self.licenses.read();
        let Some(license) = licenses.get(&listing_id) else {
            return Permission::Allowed;
        };
        if license.blocked {
            return Permission::Denied(format!(
                "License for '{}' has expired",
                license.pack_name
            ));
        }
        if license.pricing_model == PricingModel::PerUse && license.remaining_uses <= 0 {
            return Permission::Denied(format!(
                "All uses of '{}' are exhausted; purchase additional uses to continue",
                license.pack_name
            ));
        }
        Permission::Allowed
    }
}
