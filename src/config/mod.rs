//! On-disk service mapping and the in-memory copy served to handlers.
//!
//! The file is the source of truth. The in-memory mapping is loaded at
//! startup and reloaded after every successful write; single-entry updates
//! re-read the file before modifying it.

mod mapping;

pub use mapping::{ServiceMapping, batch_entries, default_mapping, valid_port};

use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to create config directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write config file {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<ServiceMapping>,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    /// Opens the store and loads whatever the file currently holds.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = load_from(&path);
        Self {
            path,
            current: RwLock::new(current),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the config directory and writes the default mapping if no
    /// config file exists. An existing file is never touched.
    pub fn init(&self) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        if self.path.exists() {
            info!(path = %self.path.display(), "config file exists");
        } else {
            self.save(&default_mapping())?;
            info!(path = %self.path.display(), "config file created with defaults");
        }
        self.reload();
        Ok(())
    }

    /// Reads the file. Missing, unreadable or malformed files yield an
    /// empty mapping.
    pub fn load(&self) -> ServiceMapping {
        load_from(&self.path)
    }

    /// Writes the whole mapping. The document goes to a temporary file next
    /// to the config and is renamed over it, so a failed write leaves the
    /// previous file in place.
    pub fn save(&self, mapping: &ServiceMapping) -> Result<(), ConfigError> {
        let document = serde_json::to_string_pretty(mapping)?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
        file.write_all(document.as_bytes()).map_err(write_err)?;
        // temp files are owner-only; keep the mode the config already had
        let permissions = match fs::metadata(&self.path) {
            Ok(existing) => existing.permissions(),
            Err(_) => default_permissions(file.as_file()).map_err(write_err)?,
        };
        fs::set_permissions(file.path(), permissions).map_err(write_err)?;
        file.persist(&self.path)
            .map_err(|err| write_err(err.error))?;
        debug!(path = %self.path.display(), entries = mapping.len(), "config saved");
        Ok(())
    }

    /// Snapshot of the in-memory mapping.
    pub fn current(&self) -> ServiceMapping {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the in-memory mapping with the file's contents.
    pub fn reload(&self) {
        let fresh = self.load();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    /// Replaces the whole file with `mapping`.
    pub fn replace_all(&self, mapping: &ServiceMapping) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.save(mapping)?;
        self.reload();
        info!(entries = mapping.len(), "config replaced");
        Ok(())
    }

    /// Maps `service_name` to `port`, dropping every entry that owned the
    /// port before.
    pub fn assign(&self, service_name: &str, port: u16) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut mapping = self.load();

        let before = mapping.len();
        mapping.retain(|_, owned| *owned != port);
        if mapping.len() < before {
            debug!(
                port,
                released = before - mapping.len(),
                "releasing port from previous services"
            );
        }
        mapping.insert(service_name.to_string(), port);

        self.save(&mapping)?;
        self.reload();
        info!(port, service_name, "config entry saved");
        Ok(())
    }
}

#[cfg(unix)]
fn default_permissions(_file: &fs::File) -> io::Result<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions(file: &fs::File) -> io::Result<fs::Permissions> {
    Ok(file.metadata()?.permissions())
}

fn load_from(path: &Path) -> ServiceMapping {
    match read_document(path) {
        Ok(raw) => mapping::normalize(raw),
        Err(ReadError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found");
            ServiceMapping::new()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to load config");
            ServiceMapping::new()
        }
    }
}

fn read_document(path: &Path) -> Result<Map<String, Value>, ReadError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::open(dir.path().join("config").join("config.json"))
    }

    #[test]
    fn init_writes_defaults_once() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.current().is_empty());

        store.init().unwrap();
        assert_eq!(store.current(), default_mapping());

        store.replace_all(&ServiceMapping::from([("Only".to_string(), 1234)])).unwrap();
        store.init().unwrap();
        assert_eq!(store.load().len(), 1);
        assert_eq!(store.current().get("Only"), Some(&1234));
    }

    #[test]
    fn missing_or_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.load().is_empty());

        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().is_empty());

        fs::write(store.path(), "[1, 2, 3]").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_then_load_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.init().unwrap();

        let mapping = ServiceMapping::from([
            ("Web".to_string(), 8080),
            ("Cache".to_string(), 6379),
        ]);
        store.save(&mapping).unwrap();

        assert_eq!(store.load(), mapping);
        let written = fs::read_to_string(store.path()).unwrap();
        assert!(written.contains("\n  \"Cache\": 6379"));
    }

    #[test]
    fn legacy_values_are_written_back_as_integers() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"Old": {"port": 3000}, "Quoted": "4000", "Plain": 5000}"#,
        )
        .unwrap();

        let loaded = store.load();
        store.save(&loaded).unwrap();

        let raw: Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw.get("Old"), Some(&Value::from(3000)));
        assert_eq!(raw.get("Quoted"), Some(&Value::from(4000)));
        assert_eq!(raw.get("Plain"), Some(&Value::from(5000)));
    }

    #[test]
    fn assign_moves_port_to_new_name() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.init().unwrap();

        store.assign("Web Server", 80).unwrap();

        let mapping = store.current();
        assert_eq!(mapping.get("Web Server"), Some(&80));
        assert!(!mapping.contains_key("HTTP"));
        assert_eq!(mapping.values().filter(|port| **port == 80).count(), 1);
    }

    #[test]
    fn assign_releases_port_from_every_previous_owner() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.init().unwrap();
        store
            .replace_all(&ServiceMapping::from([
                ("Alpha".to_string(), 3000),
                ("Beta".to_string(), 3000),
                ("Other".to_string(), 4000),
            ]))
            .unwrap();

        store.assign("Gamma", 3000).unwrap();

        let mapping = store.load();
        assert_eq!(mapping.values().filter(|port| **port == 3000).count(), 1);
        assert_eq!(mapping.get("Gamma"), Some(&3000));
        assert_eq!(mapping.get("Other"), Some(&4000));
        assert_eq!(mapping.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn save_keeps_existing_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.init().unwrap();
        let mode = |store: &ConfigStore| {
            fs::metadata(store.path()).unwrap().permissions().mode() & 0o777
        };
        assert_eq!(mode(&store), 0o644);

        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o640)).unwrap();
        store.assign("Web", 8080).unwrap();

        assert_eq!(mode(&store), 0o640);
    }

    #[test]
    fn assign_overwrites_existing_name() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.init().unwrap();

        store.assign("HTTP", 8000).unwrap();

        assert_eq!(store.current().get("HTTP"), Some(&8000));
        assert_eq!(store.load().get("HTTP"), Some(&8000));
    }

    #[test]
    fn assign_reads_file_not_memory() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.init().unwrap();

        fs::write(store.path(), r#"{"External": 9000}"#).unwrap();
        store.assign("Added", 9100).unwrap();

        let mapping = store.current();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("External"), Some(&9000));
    }
}
