use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};
use std::fs;
use crate::error::{CacheError, DdcswError};
use crate::monitor::{InputSource, Monitor, MonitorKey};
use crate::Result;

/// Inputs of one monitor as remembered between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMonitor {
    pub name: String,
    pub serial_num: Option<u64>,
    pub product_code: Option<u32>,
    pub inputs: Vec<u16>,
    pub input_names: Vec<String>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

impl CachedMonitor {
    pub fn key(&self) -> Option<MonitorKey> {
        MonitorKey::new(self.serial_num, self.product_code)
    }

    pub fn is_consistent(&self) -> bool {
        self.inputs.len() == self.input_names.len()
    }

    /// Copies the cached inputs into `monitor`.
    pub fn restore_into(&self, monitor: &mut Monitor) {
        if monitor.name.is_empty() {
            monitor.name = self.name.clone();
        }
        monitor.set_inputs(
            self.inputs
                .iter()
                .zip(self.input_names.iter())
                .map(|(code, name)| InputSource { code: *code, name: name.clone() })
                .collect(),
        );
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonitorCache {
    pub monitors: Vec<CachedMonitor>,
    pub last_save: chrono::DateTime<chrono::Utc>,
}

impl Default for MonitorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorCache {
    pub fn new() -> Self {
        Self {
            monitors: Vec::new(),
            last_save: chrono::Utc::now(),
        }
    }

    pub fn save(&mut self, cache_file: &Path) -> Result<()> {
        if let Some(parent) = cache_file.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DdcswError::Cache(CacheError::DirectoryCreation {
                    path: parent.to_path_buf(),
                    source: e,
                })
            })?;
        }

        self.last_save = chrono::Utc::now();
        let json = serde_json::to_string_pretty(self)
            .map_err(|_| DdcswError::Cache(CacheError::Serialization))?;

        fs::write(cache_file, json).map_err(|e| {
            DdcswError::Cache(CacheError::FileWrite {
                path: cache_file.to_path_buf(),
                source: e,
            })
        })?;

        log::debug!("Monitor cache saved to {:?}", cache_file);
        Ok(())
    }

    pub fn load(cache_file: &Path) -> Result<Self> {
        if !cache_file.exists() {
            log::info!("No monitor cache found, starting fresh");
            return Ok(Self::new());
        }

        let json = fs::read_to_string(cache_file).map_err(|e| {
            DdcswError::Cache(CacheError::FileRead {
                path: cache_file.to_path_buf(),
                source: e,
            })
        })?;

        let mut cache: Self = serde_json::from_str(&json)?;

        let before = cache.monitors.len();
        cache.monitors.retain(|entry| {
            let keep = entry.is_consistent() && entry.key().is_some();
            if !keep {
                log::warn!("Dropping malformed cache entry for {:?}", entry.name);
            }
            keep
        });

        log::info!(
            "Monitor cache loaded from {:?} ({} entries, {} dropped)",
            cache_file,
            cache.monitors.len(),
            before - cache.monitors.len()
        );
        Ok(cache)
    }

    pub fn get_cache_file() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("ddcsw")
            .join("monitors.json")
    }

    pub fn lookup(&self, key: &MonitorKey) -> Option<&CachedMonitor> {
        self.monitors
            .iter()
            .find(|entry| entry.key().as_ref() == Some(key))
    }

    /// Inserts or replaces the entry for `monitor`. Returns false when the
    /// monitor cannot be cached (no identity or no inputs known).
    pub fn store(&mut self, monitor: &Monitor) -> bool {
        let Some(key) = monitor.key() else {
            return false;
        };
        if !monitor.initialized || monitor.inputs().is_empty() {
            return false;
        }

        let entry = CachedMonitor {
            name: monitor.name.clone(),
            serial_num: monitor.serial_num,
            product_code: monitor.product_code,
            inputs: monitor.inputs().to_vec(),
            input_names: monitor.input_names().to_vec(),
            last_seen: chrono::Utc::now(),
        };

        match self.monitors.iter_mut().find(|e| e.key() == Some(key)) {
            Some(existing) => *existing = entry,
            None => self.monitors.push(entry),
        }
        true
    }

    /// Marks an entry as seen so stale cleanup keeps it.
    pub fn touch(&mut self, key: &MonitorKey) {
        if let Some(entry) = self.monitors.iter_mut().find(|e| e.key().as_ref() == Some(key)) {
            entry.last_seen = chrono::Utc::now();
        }
    }

    pub fn cleanup_stale(&mut self, max_age: std::time::Duration) {
        let now = chrono::Utc::now();
        let max_age = chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::days(36500));
        self.monitors.retain(|entry| now - entry.last_seen <= max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dell() -> Monitor {
        let mut monitor = Monitor::new(1);
        monitor.name = "DELL U2415".to_string();
        monitor.serial_num = Some(1112425804);
        monitor.product_code = Some(41122);
        monitor.set_inputs(vec![
            InputSource { code: 0x0f, name: "DisplayPort-1".to_string() },
            InputSource { code: 0x11, name: "HDMI-1".to_string() },
        ]);
        monitor
    }

    #[test]
    fn test_cache_save_load() {
        let temp_dir = tempdir().unwrap();
        let cache_file = temp_dir.path().join("nested").join("monitors.json");

        let mut cache = MonitorCache::new();
        assert!(cache.store(&dell()));
        cache.save(&cache_file).unwrap();

        let loaded = MonitorCache::load(&cache_file).unwrap();
        let key = MonitorKey::new(Some(1112425804), Some(41122)).unwrap();
        let entry = loaded.lookup(&key).unwrap();
        assert_eq!(entry.name, "DELL U2415");
        assert_eq!(entry.inputs, vec![0x0f, 0x11]);
        assert_eq!(entry.input_names, vec!["DisplayPort-1", "HDMI-1"]);
    }

    #[test]
    fn test_lookup_requires_both_halves_to_match() {
        let mut cache = MonitorCache::new();
        cache.store(&dell());

        let other_product = MonitorKey::new(Some(1112425804), Some(1)).unwrap();
        assert!(cache.lookup(&other_product).is_none());
    }

    #[test]
    fn test_store_replaces_existing_entry() {
        let mut cache = MonitorCache::new();
        cache.store(&dell());

        let mut updated = dell();
        updated.set_inputs(vec![InputSource { code: 0x12, name: "HDMI-2".to_string() }]);
        cache.store(&updated);

        assert_eq!(cache.monitors.len(), 1);
        assert_eq!(cache.monitors[0].inputs, vec![0x12]);
    }

    #[test]
    fn test_store_skips_unidentified_or_empty() {
        let mut cache = MonitorCache::new();

        let mut anonymous = dell();
        anonymous.serial_num = None;
        anonymous.product_code = None;
        assert!(!cache.store(&anonymous));

        let mut uninitialized = Monitor::new(2);
        uninitialized.serial_num = Some(5);
        assert!(!cache.store(&uninitialized));

        assert!(cache.monitors.is_empty());
    }

    #[test]
    fn test_restore_into_monitor() {
        let mut cache = MonitorCache::new();
        cache.store(&dell());

        let mut fresh = Monitor::new(4);
        fresh.serial_num = Some(1112425804);
        fresh.product_code = Some(41122);
        cache.lookup(&fresh.key().unwrap()).unwrap().restore_into(&mut fresh);

        assert!(fresh.initialized);
        assert_eq!(fresh.name, "DELL U2415");
        assert_eq!(fresh.number, 4);
        assert_eq!(fresh.inputs(), &[0x0f, 0x11]);
    }

    #[test]
    fn test_load_drops_mismatched_entries() {
        let temp_dir = tempdir().unwrap();
        let cache_file = temp_dir.path().join("monitors.json");
        let json = r#"{
            "monitors": [
                {"name": "bad", "serial_num": 1, "product_code": 2,
                 "inputs": [15, 17], "input_names": ["DisplayPort-1"],
                 "last_seen": "2024-01-01T00:00:00Z"},
                {"name": "good", "serial_num": 3, "product_code": 4,
                 "inputs": [17], "input_names": ["HDMI-1"],
                 "last_seen": "2024-01-01T00:00:00Z"}
            ],
            "last_save": "2024-01-01T00:00:00Z"
        }"#;
        std::fs::write(&cache_file, json).unwrap();

        let cache = MonitorCache::load(&cache_file).unwrap();
        assert_eq!(cache.monitors.len(), 1);
        assert_eq!(cache.monitors[0].name, "good");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = tempdir().unwrap();
        let cache = MonitorCache::load(&temp_dir.path().join("absent.json")).unwrap();
        assert!(cache.monitors.is_empty());
    }

    #[test]
    fn test_load_corrupted_file_fails() {
        let temp_dir = tempdir().unwrap();
        let cache_file = temp_dir.path().join("monitors.json");
        std::fs::write(&cache_file, "{not json").unwrap();

        match MonitorCache::load(&cache_file) {
            Err(DdcswError::Cache(CacheError::Corrupted { .. })) => {}
            other => panic!("Expected corrupted cache error, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_cleanup() {
        let mut cache = MonitorCache::new();
        cache.store(&dell());
        cache.monitors[0].last_seen = chrono::Utc::now() - chrono::Duration::days(100);

        cache.cleanup_stale(std::time::Duration::from_secs(90 * 24 * 3600));
        assert!(cache.monitors.is_empty());
    }
}
