//! Path normalization and content fingerprinting
//!
//! All paths stored in the index are project-root-relative with forward
//! slashes. Fingerprints are 64-bit xxh3 digests rendered as 16 lowercase
//! hex characters.

use crate::core::error::Result;
use std::path::{Path, PathBuf};

/// Convert an absolute path to a root-relative one with `/` separators.
///
/// Paths outside `root` come back prefixed with `..`; callers filter those.
pub fn to_relative(root: &Path, abs: &Path) -> String {
    let rel = pathdiff(root, abs);
    normalize_separators(&rel.to_string_lossy())
}

/// Resolve a root-relative path back to an absolute one.
pub fn to_absolute(root: &Path, rel: &str) -> PathBuf {
    root.join(rel)
}

/// Replace backslashes with forward slashes and strip a leading `./`.
pub fn normalize_separators(path: &str) -> String {
    let s = path.replace('\\', "/");
    match s.strip_prefix("./") {
        Some(stripped) => stripped.to_string(),
        None => s,
    }
}

/// 64-bit content fingerprint as 16 lowercase hex chars.
pub fn hash_string(s: &str) -> String {
    let hash = xxhash_rust::xxh3::xxh3_64(s.as_bytes());
    format!("{:016x}", hash)
}

/// Hash a file's bytes with [`hash_string`] semantics.
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let hash = xxhash_rust::xxh3::xxh3_64(&bytes);
    Ok(format!("{:016x}", hash))
}

/// Hash raw bytes already held in memory.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(bytes))
}

// std has no stable Path::relative_to; this walks common components the way
// the diff is done for display paths.
fn pathdiff(base: &Path, path: &Path) -> PathBuf {
    let mut base_components = base.components().peekable();
    let mut path_components = path.components().peekable();

    while let (Some(b), Some(p)) = (base_components.peek(), path_components.peek()) {
        if b == p {
            base_components.next();
            path_components.next();
        } else {
            break;
        }
    }

    let mut result = PathBuf::new();
    for _ in base_components {
        result.push("..");
    }
    for component in path_components {
        result.push(component.as_os_str());
    }
    result
}
