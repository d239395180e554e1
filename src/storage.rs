use rocksdb::{ColumnFamilyDescriptor, Options, WriteOptions, DB};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Browser-style local storage: flat string keys to string values, shared by
/// every widget and page on the same origin.
pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Process-lifetime storage for tests and hosts that don't persist anything.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
        items.remove(key);
        Ok(())
    }
}

const CF_LOCAL: &str = "local_storage";

/// RocksDB-backed local storage for the native host, so grants and
/// preferences survive restarts the way browser storage survives reloads.
pub struct Store {
    pub db: DB,
    path: String,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        std::fs::create_dir_all(path).ok();

        let cf_names = ["default", CF_LOCAL];
        let cf_descriptors: Vec<ColumnFamilyDescriptor> = cf_names
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        // A handful of short keys; keep the footprint small.
        db_opts.set_max_open_files(64);
        db_opts.set_keep_log_file_num(2);

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)
            .with_context(|| format!("Failed to open local storage at '{path}'"))?;

        let store = Store { db, path: path.to_string() };
        store.health_check().with_context(|| "Local storage health check failed during initialization")?;
        Ok(store)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Write, read and delete a scratch key on the default column family.
    pub fn health_check(&self) -> Result<()> {
        let test_key = b"health_check";
        self.db.put(test_key, b"ok").with_context(|| "Database write test failed")?;
        let value = self.db.get(test_key).with_context(|| "Database read test failed")?;
        if value.as_deref() != Some(b"ok") {
            anyhow::bail!("Database read/write consistency check failed");
        }
        self.db.delete(test_key).with_context(|| "Database delete test failed")?;
        Ok(())
    }
}

impl LocalStorage for Store {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let handle = self.db.cf_handle(CF_LOCAL)
            .ok_or_else(|| anyhow::anyhow!("Column family '{}' not found", CF_LOCAL))?;
        match self.db.get_cf(handle, key.as_bytes())? {
            Some(raw) => {
                let s = String::from_utf8(raw)
                    .with_context(|| format!("Value for '{key}' is not valid UTF-8"))?;
                Ok(Some(s))
            }
            None => Ok(None),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let handle = self.db.cf_handle(CF_LOCAL)
            .ok_or_else(|| anyhow::anyhow!("Column family '{}' not found", CF_LOCAL))?;
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db
            .put_cf_opt(handle, key.as_bytes(), value.as_bytes(), &write_opts)
            .with_context(|| format!("Failed to PUT '{key}' to local storage"))
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let handle = self.db.cf_handle(CF_LOCAL)
            .ok_or_else(|| anyhow::anyhow!("Column family '{}' not found", CF_LOCAL))?;
        self.db
            .delete_cf(handle, key.as_bytes())
            .with_context(|| format!("Failed to DELETE '{key}' from local storage"))
    }
}

/// Opens the configured RocksDB store as a shared `LocalStorage`.
pub fn open(cfg: &crate::config::Storage) -> Result<Arc<dyn LocalStorage>> {
    let store = Store::open(&cfg.path)?;
    Ok(Arc::new(store))
}
