use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::api::dto::DriverSettings;
use crate::error::{Error, Result};

/// Namespaced string/integer store, the shape of an embedded preferences API.
///
/// Implementations open and release their backing storage on every call; no
/// handle is held between operations.
pub trait KeyValueStore: Send + Sync {
    fn get_str(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    fn get_int(&self, namespace: &str, key: &str) -> Result<Option<i64>>;

    fn put_str(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    fn put_int(&self, namespace: &str, key: &str, value: i64) -> Result<()>;

    fn remove(&self, namespace: &str, key: &str) -> Result<()>;

    /// Removes every key in `namespace`.
    fn clear(&self, namespace: &str) -> Result<()>;

    fn get_str_or(&self, namespace: &str, key: &str, default: &str) -> String {
        match self.get_str(namespace, key) {
            Ok(Some(value)) => value,
            Ok(None) => default.to_string(),
            Err(err) => {
                log::warn!(namespace = namespace, key = key, err:display = err; "[store] Read failed");
                default.to_string()
            }
        }
    }

    fn get_int_or(&self, namespace: &str, key: &str, default: i64) -> i64 {
        match self.get_int(namespace, key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                log::warn!(namespace = namespace, key = key, err:display = err; "[store] Read failed");
                default
            }
        }
    }
}

type Namespaces = BTreeMap<String, Map<String, Value>>;

fn read_str(data: &Namespaces, namespace: &str, key: &str) -> Option<String> {
    data.get(namespace)
        .and_then(|ns| ns.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn read_int(data: &Namespaces, namespace: &str, key: &str) -> Option<i64> {
    data.get(namespace)
        .and_then(|ns| ns.get(key))
        .and_then(Value::as_i64)
}

fn write_value(data: &mut Namespaces, namespace: &str, key: &str, value: Value) {
    data.entry(namespace.to_string())
        .or_default()
        .insert(key.to_string(), value);
}

fn remove_value(data: &mut Namespaces, namespace: &str, key: &str) {
    if let Some(ns) = data.get_mut(namespace) {
        ns.remove(key);
        if ns.is_empty() {
            data.remove(namespace);
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Namespaces>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Namespaces) -> T) -> Result<T> {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

impl KeyValueStore for MemoryStore {
    fn get_str(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        self.with(|data| read_str(data, namespace, key))
    }

    fn get_int(&self, namespace: &str, key: &str) -> Result<Option<i64>> {
        self.with(|data| read_int(data, namespace, key))
    }

    fn put_str(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.with(|data| write_value(data, namespace, key, Value::from(value)))
    }

    fn put_int(&self, namespace: &str, key: &str, value: i64) -> Result<()> {
        self.with(|data| write_value(data, namespace, key, Value::from(value)))
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.with(|data| remove_value(data, namespace, key))
    }

    fn clear(&self, namespace: &str) -> Result<()> {
        self.with(|data| {
            data.remove(namespace);
        })
    }
}

/// One JSON file holding every namespace as a top-level object.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Namespaces> {
        if !self.path.exists() {
            return Ok(Namespaces::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Storage(format!("Failed to read store '{:?}': {e}", self.path)))?;
        if raw.trim().is_empty() {
            return Ok(Namespaces::new());
        }
        serde_json::from_str(&raw)
            .map_err(|e| Error::Storage(format!("Failed to parse store '{:?}': {e}", self.path)))
    }

    fn read<T>(&self, f: impl FnOnce(&Namespaces) -> T) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Storage("store lock poisoned".to_string()))?;
        Ok(f(&self.load()?))
    }

    fn update(&self, f: impl FnOnce(&mut Namespaces)) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Storage("store lock poisoned".to_string()))?;
        let mut data = self.load()?;
        f(&mut data);
        write_json_atomic(&self.path, &data)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_str(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        self.read(|data| read_str(data, namespace, key))
    }

    fn get_int(&self, namespace: &str, key: &str) -> Result<Option<i64>> {
        self.read(|data| read_int(data, namespace, key))
    }

    fn put_str(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.update(|data| write_value(data, namespace, key, Value::from(value)))
    }

    fn put_int(&self, namespace: &str, key: &str, value: i64) -> Result<()> {
        self.update(|data| write_value(data, namespace, key, Value::from(value)))
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.update(|data| remove_value(data, namespace, key))
    }

    fn clear(&self, namespace: &str) -> Result<()> {
        self.update(|data| {
            data.remove(namespace);
        })
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Storage(format!("Failed to create dir '{parent:?}': {e}")))?;
    }

    let json = serde_json::to_string_pretty(value)?;

    // Write to a sibling temp file then rename over the target.
    let tmp = path.with_extension("json.tmp");
    {
        let mut f = std::fs::File::create(&tmp)
            .map_err(|e| Error::Storage(format!("Failed to create '{tmp:?}': {e}")))?;
        f.write_all(json.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to write '{tmp:?}': {e}")))?;
        f.flush()
            .map_err(|e| Error::Storage(format!("Failed to flush '{tmp:?}': {e}")))?;
    }
    std::fs::rename(&tmp, path)
        .map_err(|e| Error::Storage(format!("Failed to move '{tmp:?}' -> '{path:?}': {e}")))?;

    Ok(())
}

pub fn load_settings(path: &Path) -> Result<DriverSettings> {
    if !path.exists() {
        return Ok(DriverSettings::default_for_device());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Storage(format!("Failed to read settings '{path:?}': {e}")))?;

    serde_json::from_str::<DriverSettings>(&raw)
        .map_err(|e| Error::Storage(format!("Failed to parse settings '{path:?}': {e}")))
}

pub fn save_settings(path: &Path, settings: &DriverSettings) -> Result<()> {
    write_json_atomic(path, settings)
}
