use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::models::NutritionRecord;

/// File-backed nutrition cache: one JSON object on disk, keyed by
/// `"<food_lowercase>_<serving_size>"`, read in full on every get and
/// rewritten in full on every put.
///
/// The mutex serializes the read-modify-write of `put` within this process,
/// and writes go through a temp file + rename so a crash mid-write can never
/// leave a torn cache file behind.
pub struct NutritionCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl NutritionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn cache_key(food_item: &str, serving_size: &str) -> String {
        format!("{}_{}", food_item.to_lowercase(), serving_size)
    }

    /// Look up a record. A missing cache file is an empty cache, not an error;
    /// an unreadable or corrupt file is an error (fatal for the request).
    pub fn get(&self, key: &str) -> Result<Option<NutritionRecord>> {
        let mut entries = self.load()?;
        Ok(entries.remove(key))
    }

    /// Insert a record and persist immediately.
    pub fn put(&self, key: &str, record: NutritionRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut entries = self.load()?;
        entries.insert(key.to_string(), record);
        self.store(&entries)?;

        log::debug!("💾 Cached nutrition entry: {}", key);
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    fn load(&self) -> Result<HashMap<String, NutritionRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(e).context(format!("failed to read cache file {}", self.path.display()))
            }
        };

        serde_json::from_str(&raw)
            .context(format!("corrupt cache file {}", self.path.display()))
    }

    fn store(&self, entries: &HashMap<String, NutritionRecord>) -> Result<()> {
        let raw = serde_json::to_string(entries)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .context(format!("failed to write cache file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .context(format!("failed to replace cache file {}", self.path.display()))?;

        Ok(())
    }
}
