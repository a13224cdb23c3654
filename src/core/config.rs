//! Index configuration

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Debounce window for watcher events (ms)
pub const WATCHER_DEBOUNCE_MS: u64 = 100;

/// Interval between ownership heartbeats (seconds)
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Heartbeats older than this are considered stale (seconds)
pub const OWNER_STALE_AFTER_SECS: u64 = 90;

/// Default parse cache capacity (entries)
pub const PARSE_CACHE_CAPACITY: usize = 500;

/// Options controlling where the index lives and what it watches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Directory under the project root that holds index state
    pub data_dir: String,
    /// Database file name inside the data dir
    pub db_file: String,
    /// File extensions the indexer and watcher accept
    pub extensions: Vec<String>,
    /// Directory names excluded from discovery and watching
    pub ignore_dirs: Vec<String>,
    /// Watcher debounce window in milliseconds
    pub debounce_ms: u64,
    /// Parse cache capacity
    pub parse_cache_capacity: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            data_dir: ".symdex".to_string(),
            db_file: "index.db".to_string(),
            extensions: vec![
                "ts".to_string(),
                "tsx".to_string(),
                "js".to_string(),
                "jsx".to_string(),
                "mts".to_string(),
                "cts".to_string(),
                "mjs".to_string(),
                "cjs".to_string(),
            ],
            ignore_dirs: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "dist".to_string(),
            ],
            debounce_ms: WATCHER_DEBOUNCE_MS,
            parse_cache_capacity: PARSE_CACHE_CAPACITY,
        }
    }
}

impl IndexOptions {
    /// Load options from `symdex.toml` at the project root, falling back to
    /// defaults when the file is absent.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join("symdex.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let options: IndexOptions = toml::from_str(&content)
            .map_err(|e| crate::core::error::Error::Index(format!("symdex.toml: {}", e)))?;
        Ok(options)
    }

    /// Absolute path of the database file.
    pub fn db_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.data_dir).join(&self.db_file)
    }

    /// Whether a path has one of the configured extensions.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let lower = ext.to_lowercase();
                self.extensions.iter().any(|e| e == &lower)
            })
            .unwrap_or(false)
    }

    /// Whether any component of the path is an ignored directory, including
    /// the index's own data dir.
    pub fn is_ignored(&self, path: &Path) -> bool {
        path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|name| name == self.data_dir || self.ignore_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = IndexOptions::default();
        assert_eq!(options.data_dir, ".symdex");
        assert_eq!(options.debounce_ms, 100);
        assert!(options.matches_extension(Path::new("a.ts")));
        assert!(options.matches_extension(Path::new("a.TSX")));
        assert!(!options.matches_extension(Path::new("a.rs")));
        assert!(!options.matches_extension(Path::new("Makefile")));
    }

    #[test]
    fn test_is_ignored() {
        let options = IndexOptions::default();
        assert!(options.is_ignored(Path::new("node_modules/pkg/index.ts")));
        assert!(options.is_ignored(Path::new("a/.git/x")));
        assert!(options.is_ignored(Path::new(".symdex/index.db")));
        assert!(!options.is_ignored(Path::new("src/main.ts")));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let options = IndexOptions::load(temp.path()).unwrap();
        assert_eq!(options.db_file, "index.db");
    }

    #[test]
    fn test_load_overrides() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("symdex.toml"),
            "debounce_ms = 250\nextensions = [\"ts\"]\n",
        )
        .unwrap();
        let options = IndexOptions::load(temp.path()).unwrap();
        assert_eq!(options.debounce_ms, 250);
        assert_eq!(options.extensions, vec!["ts".to_string()]);
        // Unspecified fields keep their defaults
        assert_eq!(options.data_dir, ".symdex");
    }
}
