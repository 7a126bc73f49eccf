//! File-backed key-value area shared by the local adapter and the session gate.
//!
//! The whole map is read and rewritten on every call. There is no locking:
//! two processes writing the same file race and the last rename wins.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct KvFile {
    path: PathBuf,
}

impl KvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.read_map()?.remove(key))
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), AppError> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.into());
        self.write_map(&map)
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool, AppError> {
        let mut map = self.read_map()?;
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.write_map(&map)?;
        Ok(true)
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, AppError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw).map_err(|e| {
            AppError::Storage(format!(
                "Key-value file {} is corrupt: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
