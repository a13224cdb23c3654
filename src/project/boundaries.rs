//! Project boundary discovery
//!
//! A monorepo is carved into named projects by its `package.json` manifests.
//! Boundaries are root-relative directories sorted deepest-first so the most
//! specific prefix wins when a file is assigned to a project.

use crate::core::config::IndexOptions;
use crate::core::error::Result;
use crate::core::paths::{normalize_separators, to_relative};
use ignore::WalkBuilder;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// A `(dir, name)` pair identifying a sub-tree as a named project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBoundary {
    /// Root-relative directory with `/` separators; `.` for the root itself
    pub dir: String,
    /// Project name from the manifest, basename fallback
    pub name: String,
}

#[derive(Deserialize)]
struct PackageManifest {
    name: Option<String>,
}

/// Enumerate every `package.json` under `project_root` and derive the
/// boundary list, deepest directory first.
pub fn discover_boundaries(project_root: &Path, options: &IndexOptions) -> Result<Vec<ProjectBoundary>> {
    let mut boundaries = Vec::new();

    let walker = WalkBuilder::new(project_root)
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .filter_entry({
            let ignored: Vec<String> = options
                .ignore_dirs
                .iter()
                .cloned()
                .chain(std::iter::once(options.data_dir.clone()))
                .collect();
            move |entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !ignored.iter().any(|d| d == name))
                    .unwrap_or(true)
            }
        })
        .build();

    for entry in walker.flatten() {
        let path = entry.path();
        if path.file_name().and_then(|n| n.to_str()) != Some("package.json") {
            continue;
        }
        let dir_abs = match path.parent() {
            Some(p) => p,
            None => continue,
        };
        let dir = if dir_abs == project_root {
            ".".to_string()
        } else {
            to_relative(project_root, dir_abs)
        };

        let name = match read_manifest_name(path) {
            Some(name) => name,
            None => {
                if dir == "." {
                    basename(project_root)
                } else {
                    basename(dir_abs)
                }
            }
        };

        debug!("Project boundary: {} -> {}", dir, name);
        boundaries.push(ProjectBoundary { dir, name });
    }

    // Longest directory path first; the first prefix match wins.
    boundaries.sort_by(|a, b| b.dir.len().cmp(&a.dir.len()));
    Ok(boundaries)
}

fn read_manifest_name(path: &Path) -> Option<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Unreadable manifest {}: {}", path.display(), e);
            return None;
        }
    };
    let manifest: PackageManifest = match serde_json::from_str(&content) {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!("Malformed manifest {}: {}", path.display(), e);
            return None;
        }
    };
    manifest.name.filter(|n| !n.trim().is_empty())
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string())
}

/// Resolve a root-relative file path to its owning project name.
///
/// The first boundary whose directory equals the path or prefixes it wins;
/// the `.` boundary catches everything else, then `fallback`.
pub fn resolve_file_project(path: &str, boundaries: &[ProjectBoundary], fallback: &str) -> String {
    let path = normalize_separators(path);
    for boundary in boundaries {
        if boundary.dir == path || path.starts_with(&format!("{}/", boundary.dir)) {
            return boundary.name.clone();
        }
    }
    boundaries
        .iter()
        .find(|b| b.dir == ".")
        .map(|b| b.name.clone())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, name: Option<&str>) {
        std::fs::create_dir_all(dir).unwrap();
        let body = match name {
            Some(n) => format!("{{\"name\": \"{}\"}}", n),
            None => "{}".to_string(),
        };
        std::fs::write(dir.join("package.json"), body).unwrap();
    }

    #[test]
    fn test_discovery_deepest_first() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), Some("workspace"));
        write_manifest(&temp.path().join("packages/app"), Some("@acme/app"));
        write_manifest(&temp.path().join("packages/lib"), None);

        let boundaries = discover_boundaries(temp.path(), &IndexOptions::default()).unwrap();
        assert_eq!(boundaries.len(), 3);
        // Root entry sorts last (shortest dir)
        assert_eq!(boundaries.last().unwrap().dir, ".");
        assert_eq!(boundaries.last().unwrap().name, "workspace");
        // Missing name falls back to the directory basename
        assert!(boundaries
            .iter()
            .any(|b| b.dir == "packages/lib" && b.name == "lib"));
    }

    #[test]
    fn test_discovery_skips_node_modules() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), Some("root"));
        write_manifest(&temp.path().join("node_modules/dep"), Some("dep"));

        let boundaries = discover_boundaries(temp.path(), &IndexOptions::default()).unwrap();
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].name, "root");
    }

    #[test]
    fn test_resolve_file_project() {
        let boundaries = vec![
            ProjectBoundary {
                dir: "packages/app".into(),
                name: "app".into(),
            },
            ProjectBoundary {
                dir: "packages".into(),
                name: "packages".into(),
            },
            ProjectBoundary {
                dir: ".".into(),
                name: "root".into(),
            },
        ];

        assert_eq!(
            resolve_file_project("packages/app/src/x.ts", &boundaries, "fb"),
            "app"
        );
        assert_eq!(resolve_file_project("packages/app", &boundaries, "fb"), "app");
        assert_eq!(
            resolve_file_project("packages/other/y.ts", &boundaries, "fb"),
            "packages"
        );
        assert_eq!(resolve_file_project("src/z.ts", &boundaries, "fb"), "root");
        assert_eq!(resolve_file_project("src\\z.ts", &boundaries, "fb"), "root");
        // "packages-extra" must not prefix-match "packages"
        assert_eq!(
            resolve_file_project("packages-extra/y.ts", &boundaries, "fb"),
            "root"
        );
        assert_eq!(resolve_file_project("anything", &[], "fb"), "fb");
    }
}
