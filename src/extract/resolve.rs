//! Module specifier resolution
//!
//! Pure candidate generation: no filesystem access. Relative specifiers get
//! the TypeScript extension ladder; bare specifiers go through the alias
//! pattern map. The indexer narrows candidates with a known-files filter so
//! that written relations always reference an indexed file row.

use crate::core::paths::to_relative;
use crate::project::aliases::AliasConfig;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Extensionless candidate ladder, in resolution order.
const EXTENSION_LADDER: &[(&str, bool)] = &[
    (".ts", false),
    (".d.ts", false),
    ("index.ts", true),
    ("index.d.ts", true),
    (".mts", false),
    ("index.mts", true),
    (".cts", false),
    ("index.cts", true),
];

/// Generate destination candidates for `specifier` imported from `importer`.
///
/// Relative specifiers join against the importing file's directory; bare
/// specifiers match alias patterns against `base_url`. Anything else yields
/// no candidates.
pub fn candidate_paths(
    specifier: &str,
    importer: &Path,
    aliases: Option<&AliasConfig>,
) -> Vec<PathBuf> {
    if specifier.starts_with('.') {
        let dir = match importer.parent() {
            Some(dir) => dir,
            None => return Vec::new(),
        };
        return expand_candidates(normalize_lexically(&dir.join(specifier)));
    }

    let Some(config) = aliases else {
        return Vec::new();
    };

    let mut candidates = Vec::new();
    for (pattern, targets) in &config.paths {
        if let Some(star) = pattern.find('*') {
            let (prefix, suffix) = (&pattern[..star], &pattern[star + 1..]);
            if specifier.len() >= prefix.len() + suffix.len()
                && specifier.starts_with(prefix)
                && specifier.ends_with(suffix)
            {
                let captured = &specifier[prefix.len()..specifier.len() - suffix.len()];
                for target in targets {
                    let substituted = target.replacen('*', captured, 1);
                    let base = normalize_lexically(&config.base_url.join(substituted));
                    candidates.extend(expand_candidates(base));
                }
            }
        } else if pattern == specifier {
            for target in targets {
                let base = normalize_lexically(&config.base_url.join(target));
                candidates.extend(expand_candidates(base));
            }
        }
    }
    candidates
}

fn expand_candidates(base: PathBuf) -> Vec<PathBuf> {
    let ext = base.extension().and_then(|e| e.to_str()).map(str::to_owned);

    match ext.as_deref() {
        None => {
            let raw = base.to_string_lossy().to_string();
            EXTENSION_LADDER
                .iter()
                .map(|(suffix, is_index)| {
                    if *is_index {
                        base.join(suffix)
                    } else {
                        PathBuf::from(format!("{}{}", raw, suffix))
                    }
                })
                .collect()
        }
        // Emitted-JS specifiers point back at their TypeScript sources
        Some("js") => vec![base.with_extension("ts")],
        Some("mjs") => vec![base.with_extension("mts")],
        Some("cjs") => vec![base.with_extension("cts")],
        Some(_) => vec![base],
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Picks one destination out of the candidate list.
pub trait SpecifierResolver: Send + Sync {
    fn resolve(&self, specifier: &str, importer: &Path) -> Option<PathBuf>;
}

/// Default resolver: the first candidate wins.
pub struct FirstCandidateResolver {
    pub aliases: Option<AliasConfig>,
}

impl SpecifierResolver for FirstCandidateResolver {
    fn resolve(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        candidate_paths(specifier, importer, self.aliases.as_ref())
            .into_iter()
            .next()
    }
}

/// Known-files filter: the first candidate whose root-relative form is
/// present in the current snapshot of indexed files wins. Keeps two-pass
/// writes FK-safe.
pub struct KnownFilesResolver {
    pub root: PathBuf,
    pub known: HashSet<String>,
    pub aliases: Option<AliasConfig>,
}

impl SpecifierResolver for KnownFilesResolver {
    fn resolve(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        candidate_paths(specifier, importer, self.aliases.as_ref())
            .into_iter()
            .find(|candidate| {
                let rel = to_relative(&self.root, candidate);
                !rel.starts_with("..") && self.known.contains(&rel)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(candidates: &[PathBuf]) -> Vec<String> {
        candidates
            .iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_relative_extension_ladder() {
        let candidates = candidate_paths("./m", Path::new("/proj/src/a.ts"), None);
        assert_eq!(
            paths(&candidates),
            vec![
                "/proj/src/m.ts",
                "/proj/src/m.d.ts",
                "/proj/src/m/index.ts",
                "/proj/src/m/index.d.ts",
                "/proj/src/m.mts",
                "/proj/src/m/index.mts",
                "/proj/src/m.cts",
                "/proj/src/m/index.cts",
            ]
        );
    }

    #[test]
    fn test_parent_relative_normalized() {
        let candidates = candidate_paths("../lib/util", Path::new("/proj/src/a.ts"), None);
        assert_eq!(paths(&candidates)[0], "/proj/lib/util.ts");
    }

    #[test]
    fn test_js_substitution() {
        let candidates = candidate_paths("./m.js", Path::new("/proj/a.ts"), None);
        assert_eq!(paths(&candidates), vec!["/proj/m.ts"]);
        let candidates = candidate_paths("./m.mjs", Path::new("/proj/a.ts"), None);
        assert_eq!(paths(&candidates), vec!["/proj/m.mts"]);
    }

    #[test]
    fn test_other_extension_as_is() {
        let candidates = candidate_paths("./styles.css", Path::new("/proj/a.ts"), None);
        assert_eq!(paths(&candidates), vec!["/proj/styles.css"]);
    }

    #[test]
    fn test_bare_specifier_without_aliases() {
        assert!(candidate_paths("react", Path::new("/proj/a.ts"), None).is_empty());
    }

    #[test]
    fn test_alias_star_pattern() {
        let config = AliasConfig {
            base_url: PathBuf::from("/proj"),
            paths: vec![("@app/*".to_string(), vec!["src/app/*".to_string()])],
        };
        let candidates = candidate_paths("@app/util/fmt", Path::new("/proj/x.ts"), Some(&config));
        assert_eq!(paths(&candidates)[0], "/proj/src/app/util/fmt.ts");
        assert_eq!(candidates.len(), 8);

        assert!(candidate_paths("@other/x", Path::new("/proj/x.ts"), Some(&config)).is_empty());
    }

    #[test]
    fn test_alias_exact_pattern() {
        let config = AliasConfig {
            base_url: PathBuf::from("/proj"),
            paths: vec![("config".to_string(), vec!["src/config".to_string()])],
        };
        let candidates = candidate_paths("config", Path::new("/proj/x.ts"), Some(&config));
        assert_eq!(paths(&candidates)[0], "/proj/src/config.ts");
        assert!(candidate_paths("config/extra", Path::new("/proj/x.ts"), Some(&config)).is_empty());
    }

    #[test]
    fn test_known_files_resolver() {
        let resolver = KnownFilesResolver {
            root: PathBuf::from("/proj"),
            known: ["src/m/index.ts".to_string()].into_iter().collect(),
            aliases: None,
        };
        let resolved = resolver.resolve("./m", Path::new("/proj/src/a.ts")).unwrap();
        assert_eq!(
            resolved.to_string_lossy().replace('\\', "/"),
            "/proj/src/m/index.ts"
        );

        assert!(resolver.resolve("./gone", Path::new("/proj/src/a.ts")).is_none());
    }

    #[test]
    fn test_first_candidate_resolver() {
        let resolver = FirstCandidateResolver { aliases: None };
        let resolved = resolver.resolve("./m", Path::new("/proj/src/a.ts")).unwrap();
        assert_eq!(
            resolved.to_string_lossy().replace('\\', "/"),
            "/proj/src/m.ts"
        );
    }
}
