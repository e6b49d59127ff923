use super::json_file::{read_json_or_default, write_json_atomic};
use crate::constants::PACK_PASSWORD_FILE;
use crate::error::AppResult;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Decryption passphrases for downloaded packs, keyed by local file path.
pub struct PackPasswordStore {
    path: PathBuf,
    passwords: RwLock<HashMap<String, String>>,
}

impl PackPasswordStore {
    pub fn new(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(PACK_PASSWORD_FILE))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            passwords: RwLock::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AppResult<()> {
        let stored: HashMap<String, String> = read_json_or_default(&self.path)?;
        *self.passwords.write() = stored;
        Ok(())
    }

    pub fn save(&self) -> AppResult<()> {
        let passwords = self.passwords.read();
        let sorted: BTreeMap<&String, &String> = passwords.iter().collect();
        write_json_atomic(&self.path, &sorted)
    }

    pub fn set_password(&self, file_path: impl Into<String>, password: impl Into<String>) {
        self.passwords
            .write()
            .insert(file_path.into(), password.into());
    }

    pub fn get_password(&self, file_path: &str) -> Option<String> {
        self.passwords.read().get(file_path).cloned()
    }

    pub fn delete_password(&self, file_path: &str) -> Option<String> {
        self.passwords.write().remove(file_path)
    }

    /// Copies every stored entry into `target`, overwriting same-path entries.
    pub fn load_into_map(&self, target: &mut HashMap<String, String>) {
        for (path, password) in self.passwords.read().iter() {
            target.insert(path.clone(), password.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.passwords.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.passwords.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("packledger-passwords-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn mutations_persist_only_on_save() {
        let dir = temp_dir();
        let store = PackPasswordStore::new(&dir);
        store.set_password("/cache/qap/marketplace_pack_1.qap", "s3cret");
        assert!(!store.path().exists());

        store.save().unwrap();
        let reloaded = PackPasswordStore::new(&dir);
        reloaded.load().unwrap();
        assert_eq!(
            reloaded.get_password("/cache/qap/marketplace_pack_1.qap"),
            Some("s3cret".to_string())
        );

        let raw: HashMap<String, String> =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw.len(), 1);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_into_map_merges_entries() {
        let store = PackPasswordStore::with_path(temp_dir().join(PACK_PASSWORD_FILE));
        store.set_password("a.qap", "one");
        store.set_password("b.qap", "two");

        let mut external = HashMap::new();
        external.insert("a.qap".to_string(), "stale".to_string());
        external.insert("c.qap".to_string(), "three".to_string());
        store.load_into_map(&mut external);

        assert_eq!(external.len(), 3);
        assert_eq!(external["a.qap"], "one");
        assert_eq!(external["c.qap"], "three");
    }

    #[test]
    fn delete_password_removes_entry() {
        let store = PackPasswordStore::with_path(temp_dir().join(PACK_PASSWORD_FILE));
        store.set_password("a.qap", "one");
        assert_eq!(store.delete_password("a.qap"), Some("one".to_string()));
        assert_eq!(store.get_password("a.qap"), None);
        assert!(store.is_empty());
    }
}
