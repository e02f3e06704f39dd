use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use {thiserror::Error, tracing::debug};

/// Key holding a credential's value under its service.
pub const VALUE_KEY: &str = "value";
/// Key holding a credential's issue timestamp under its service.
pub const TIMESTAMP_KEY: &str = "timestamp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential store at {path} is corrupted: {source}")]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("credential store rejected the write: {0}")]
    Rejected(String),
}

/// One `(service, key) = value` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub service: String,
    pub key: String,
    pub value: String,
}

impl StoreEntry {
    pub fn new(service: &str, key: &str, value: impl Into<String>) -> Self {
        Self {
            service: service.to_string(),
            key: key.to_string(),
            value: value.into(),
        }
    }
}

/// Durable string key-value storage addressed by `(service, key)`.
pub trait CredentialStore {
    fn read(&self, service: &str, key: &str) -> Result<Option<String>, StoreError>;

    /// Write every entry; either all of them land or none do.
    fn write_batch(&self, entries: &[StoreEntry]) -> Result<(), StoreError>;

    /// Remove an entry. Missing entries are not an error.
    fn delete(&self, service: &str, key: &str) -> Result<(), StoreError>;

    fn write(&self, service: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.write_batch(&[StoreEntry::new(service, key, value)])
    }
}

type ServiceMap = BTreeMap<String, BTreeMap<String, String>>;

/// File-based storage at `~/.config/stetho/credentials.json`.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// batch is never half-applied on disk.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_map(&self) -> Result<ServiceMap, StoreError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ServiceMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            },
        };
        if data.trim().is_empty() {
            return Ok(ServiceMap::new());
        }
        serde_json::from_str(&data).map_err(|source| StoreError::Corrupted {
            path: self.path.clone(),
            source,
        })
    }

    fn save_map(&self, map: &ServiceMap) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let data = serde_json::to_string_pretty(map).map_err(|source| StoreError::Corrupted {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &data).map_err(io_err)?;

        // Secrets live in this file: owner read/write only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }

        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(path = %self.path.display(), "credential store saved");
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn read(&self, service: &str, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.load_map()?;
        Ok(map.get(service).and_then(|s| s.get(key)).cloned())
    }

    fn write_batch(&self, entries: &[StoreEntry]) -> Result<(), StoreError> {
        let mut map = self.load_map()?;
        for entry in entries {
            map.entry(entry.service.clone())
                .or_default()
                .insert(entry.key.clone(), entry.value.clone());
        }
        self.save_map(&map)
    }

    fn delete(&self, service: &str, key: &str) -> Result<(), StoreError> {
        let mut map = self.load_map()?;
        let Some(keys) = map.get_mut(service) else {
            return Ok(());
        };
        if keys.remove(key).is_none() {
            return Ok(());
        }
        if keys.is_empty() {
            map.remove(service);
        }
        self.save_map(&map)
    }
}

/// In-process store, mostly for tests. Counts write batches and can be told
/// to reject writes.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RefCell<ServiceMap>,
    batches: Cell<usize>,
    reject_writes: Cell<bool>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `write_batch` calls so far.
    pub fn batches(&self) -> usize {
        self.batches.get()
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.set(reject);
    }

    pub fn get(&self, service: &str, key: &str) -> Option<String> {
        self.entries
            .borrow()
            .get(service)
            .and_then(|s| s.get(key))
            .cloned()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn read(&self, service: &str, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get(service, key))
    }

    fn write_batch(&self, entries: &[StoreEntry]) -> Result<(), StoreError> {
        if self.reject_writes.get() {
            return Err(StoreError::Rejected("writes disabled".into()));
        }
        let mut map = self.entries.borrow_mut();
        for entry in entries {
            map.entry(entry.service.clone())
                .or_default()
                .insert(entry.key.clone(), entry.value.clone());
        }
        self.batches.set(self.batches.get() + 1);
        Ok(())
    }

    fn delete(&self, service: &str, key: &str) -> Result<(), StoreError> {
        let mut map = self.entries.borrow_mut();
        if let Some(keys) = map.get_mut(service) {
            keys.remove(key);
            if keys.is_empty() {
                map.remove(service);
            }
        }
        Ok(())
    }
}
