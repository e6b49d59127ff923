use crate::error::AppResult;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Reads a JSON document from `path`.
///
/// A missing file yields `T::default()`. A file that fails to parse is copied aside to
/// `<file>.corrupted.<unix-ts>` and also yields the default. Any other read failure is an error.
pub fn read_json_or_default<T>(path: &Path) -> AppResult<T>
where
    T: DeserializeOwned + Default,
{
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&content) {
        Ok(value) => Ok(value),
        Err(e) => {
            let backup = corrupted_backup_path(path);
            match fs::copy(path, &backup) {
                Ok(_) => tracing::warn!(
                    "Corrupt store file {:?} ({}), reset to empty; original kept at {:?}",
                    path,
                    e,
                    backup
                ),
                Err(copy_err) => tracing::warn!(
                    "Corrupt store file {:?} ({}), reset to empty; backup failed: {}",
                    path,
                    e,
                    copy_err
                ),
            }
            Ok(T::default())
        }
    }
}

/// Replaces `path` with the pretty-printed JSON of `value` via a temp file and rename.
pub fn write_json_atomic<T>(path: &Path, value: &T) -> AppResult<()>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(value)?;
    let temp_path = temp_path_for(path);
    fs::write(&temp_path, content)?;
    restrict_permissions(&temp_path);
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn corrupted_backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".corrupted.{}", chrono::Utc::now().timestamp()));
    path.with_file_name(name)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::debug!("Failed to restrict permissions on {:?}: {}", path, e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("packledger-json-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn missing_file_reads_as_default() {
        let dir = temp_dir();
        let value: BTreeMap<String, String> =
            read_json_or_default(&dir.join("absent.json")).expect("read");
        assert!(value.is_empty());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_file_is_backed_up_and_reads_as_default() {
        let dir = temp_dir();
        let path = dir.join("store.json");
        fs::write(&path, "{not json").expect("write");

        let value: BTreeMap<String, String> = read_json_or_default(&path).expect("read");
        assert!(value.is_empty());

        let backups: Vec<_> = fs::read_dir(&dir)
            .expect("read dir")
            .flatten()
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with("store.json.corrupted.")
            })
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            fs::read_to_string(backups[0].path()).expect("backup"),
            "{not json"
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn atomic_write_creates_parent_and_leaves_no_temp_file() {
        let dir = temp_dir();
        let path = dir.join("nested").join("store.json");
        let mut value = BTreeMap::new();
        value.insert("a".to_string(), "b".to_string());

        write_json_atomic(&path, &value).expect("write");

        let back: BTreeMap<String, String> = read_json_or_default(&path).expect("read");
        assert_eq!(back, value);
        assert!(!temp_path_for(&path).exists());
        let _ = fs::remove_dir_all(dir);
    }
}
