//! Persisted session configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memory::DEFAULT_MAX_READ_PAGES;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Executable name of the target process.
    pub process_name: String,
    /// Module whose base address anchors pointer chains.
    pub module_name: String,
    /// Delay between read cycles in the watch loop (ms).
    pub poll_interval_ms: u64,
    /// Delay before retrying startup when the target is missing (secs).
    pub startup_retry_secs: u64,
    /// Upper bound for contiguous reads, in pages.
    pub max_read_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process_name: String::new(),
            module_name: String::new(),
            poll_interval_ms: 150,
            startup_retry_secs: 15,
            max_read_pages: DEFAULT_MAX_READ_PAGES,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dmalens.json");

        let config = Config {
            process_name: "game.exe".to_string(),
            module_name: "engine.dll".to_string(),
            poll_interval_ms: 200,
            startup_retry_secs: 5,
            max_read_pages: 64,
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.process_name, "game.exe");
        assert_eq!(loaded.module_name, "engine.dll");
        assert_eq!(loaded.poll_interval_ms, 200);
        assert_eq!(loaded.max_read_pages, 64);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dmalens.json");
        std::fs::write(&path, r#"{"process_name": "target.exe"}"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.process_name, "target.exe");
        assert_eq!(loaded.poll_interval_ms, Config::default().poll_interval_ms);
        assert_eq!(loaded.max_read_pages, DEFAULT_MAX_READ_PAGES);
    }
}
