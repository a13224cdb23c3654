//! Path-alias configuration
//!
//! Reads `tsconfig.json` (or `jsconfig.json`), tolerating the JSONC dialect
//! TypeScript accepts: line comments, block comments, trailing commas.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved `compilerOptions.baseUrl` + `paths` for one project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasConfig {
    /// Absolute base directory alias targets resolve against
    pub base_url: PathBuf,
    /// Pattern -> target list, e.g. `@app/*` -> `["src/app/*"]`
    pub paths: Vec<(String, Vec<String>)>,
}

/// Load alias configuration for a project root. Returns `None` when neither
/// `baseUrl` nor a usable `paths` map is present.
pub fn load_alias_config(root: &Path) -> Option<AliasConfig> {
    let config_path = ["tsconfig.json", "jsconfig.json"]
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.exists())?;

    let raw = std::fs::read_to_string(&config_path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&strip_jsonc(&raw)).ok()?;

    let compiler = value.get("compilerOptions")?.as_object()?;

    let base_url = compiler.get("baseUrl").and_then(|v| v.as_str());
    let mut paths = Vec::new();
    if let Some(map) = compiler.get("paths").and_then(|v| v.as_object()) {
        for (pattern, targets) in map {
            // Non-array targets are skipped; non-string elements filtered.
            let Some(list) = targets.as_array() else {
                continue;
            };
            let targets: Vec<String> = list
                .iter()
                .filter_map(|t| t.as_str())
                .map(|t| t.replace('\\', "/"))
                .collect();
            if !targets.is_empty() {
                paths.push((pattern.clone(), targets));
            }
        }
    }

    if base_url.is_none() && paths.is_empty() {
        return None;
    }

    let base_url = root.join(base_url.unwrap_or("."));
    debug!(
        "Alias config for {}: baseUrl={}, {} patterns",
        root.display(),
        base_url.display(),
        paths.len()
    );
    Some(AliasConfig { base_url, paths })
}

/// Strip JSONC comments and trailing commas, preserving string literals.
fn strip_jsonc(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                // Copy the string literal verbatim, honoring escapes
                out.push(b'"');
                i += 1;
                while i < bytes.len() {
                    let s = bytes[i];
                    out.push(s);
                    i += 1;
                    if s == b'\\' && i < bytes.len() {
                        out.push(bytes[i]);
                        i += 1;
                    } else if s == b'"' {
                        break;
                    }
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b',' => {
                if next_significant(bytes, i + 1)
                    .map(|c| c == b'}' || c == b']')
                    .unwrap_or(false)
                {
                    // trailing comma: drop it
                } else {
                    out.push(b',');
                }
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// First byte at or after `from` that is not whitespace or a comment.
fn next_significant(bytes: &[u8], mut j: usize) -> Option<u8> {
    while j < bytes.len() {
        match bytes[j] {
            b' ' | b'\t' | b'\r' | b'\n' => j += 1,
            b'/' if j + 1 < bytes.len() && bytes[j + 1] == b'/' => {
                while j < bytes.len() && bytes[j] != b'\n' {
                    j += 1;
                }
            }
            b'/' if j + 1 < bytes.len() && bytes[j + 1] == b'*' => {
                j += 2;
                while j + 1 < bytes.len() && !(bytes[j] == b'*' && bytes[j + 1] == b'/') {
                    j += 1;
                }
                j = (j + 2).min(bytes.len());
            }
            c => return Some(c),
        }
    }
    None
}

/// Per-root cache of alias configurations.
#[derive(Default)]
pub struct AliasCache {
    entries: RwLock<HashMap<PathBuf, Option<AliasConfig>>>,
}

impl AliasCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load-through lookup.
    pub fn get(&self, root: &Path) -> Option<AliasConfig> {
        if let Some(cached) = self.entries.read().get(root) {
            return cached.clone();
        }
        let loaded = load_alias_config(root);
        self.entries
            .write()
            .insert(root.to_path_buf(), loaded.clone());
        loaded
    }

    /// Drop the cached entry for one root.
    pub fn invalidate(&self, root: &Path) {
        self.entries.write().remove(root);
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_strip_jsonc() {
        let input = r#"{
  // line comment
  "a": 1, /* block
  comment */
  "b": "keep // this",
  "c": [1, 2,],
}"#;
        let value: serde_json::Value = serde_json::from_str(&strip_jsonc(input)).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"], "keep // this");
        assert_eq!(value["c"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_load_alias_config() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("tsconfig.json"),
            r#"{
  "compilerOptions": {
    // aliases
    "baseUrl": ".",
    "paths": {
      "@app/*": ["src/app/*"],
      "bad": "not-an-array",
      "mixed/*": ["src/ok/*", 42],
    },
  }
}"#,
        )
        .unwrap();

        let config = load_alias_config(temp.path()).unwrap();
        assert_eq!(config.base_url, temp.path().join("."));
        assert_eq!(config.paths.len(), 2);
        let app = config.paths.iter().find(|(p, _)| p == "@app/*").unwrap();
        assert_eq!(app.1, vec!["src/app/*".to_string()]);
        let mixed = config.paths.iter().find(|(p, _)| p == "mixed/*").unwrap();
        assert_eq!(mixed.1, vec!["src/ok/*".to_string()]);
    }

    #[test]
    fn test_load_returns_none_without_usable_fields() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("tsconfig.json"),
            r#"{"compilerOptions": {"strict": true}}"#,
        )
        .unwrap();
        assert!(load_alias_config(temp.path()).is_none());

        let empty = TempDir::new().unwrap();
        assert!(load_alias_config(empty.path()).is_none());
    }

    #[test]
    fn test_cache_invalidation() {
        let temp = TempDir::new().unwrap();
        let cache = AliasCache::new();
        assert!(cache.get(temp.path()).is_none());

        std::fs::write(
            temp.path().join("tsconfig.json"),
            r#"{"compilerOptions": {"baseUrl": "src"}}"#,
        )
        .unwrap();
        // Negative result is cached until invalidated
        assert!(cache.get(temp.path()).is_none());
        cache.invalidate(temp.path());
        assert!(cache.get(temp.path()).is_some());

        cache.invalidate_all();
        assert!(cache.get(temp.path()).is_some());
    }
}
