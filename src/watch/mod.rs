//! Filesystem watcher
//!
//! Thin wrapper over notify: filters raw events to configured extensions
//! (plus the config manifests the coordinator reacts to) and forwards them
//! over an mpsc channel. The coordinator owns debouncing; nothing here
//! mutates index state.

use crate::core::config::IndexOptions;
use crate::core::error::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Config manifests that trigger coordinator side effects even though they
/// are not indexable sources.
const CONFIG_FILES: &[&str] = &["tsconfig.json", "jsconfig.json", "package.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Create,
    Change,
    Delete,
}

#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    /// Absolute path
    pub path: PathBuf,
}

/// Watches a project tree for source changes.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root`, sending filtered events into `tx`.
    pub fn new(
        root: PathBuf,
        options: IndexOptions,
        tx: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self> {
        let event_root = root.clone();
        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => forward_event(&event, &event_root, &options, &tx),
                Err(e) => error!("Watch error: {}", e),
            },
            notify::Config::default(),
        )?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!("Watching for changes: {}", root.display());

        Ok(Self { watcher, root })
    }

    pub fn stop(mut self) {
        let _ = self.watcher.unwatch(&self.root);
    }
}

fn forward_event(
    event: &Event,
    root: &Path,
    options: &IndexOptions,
    tx: &mpsc::UnboundedSender<WatchEvent>,
) {
    let kind = match event.kind {
        EventKind::Create(_) => WatchEventKind::Create,
        EventKind::Modify(_) => WatchEventKind::Change,
        EventKind::Remove(_) => WatchEventKind::Delete,
        _ => return,
    };

    for path in &event.paths {
        if !path.starts_with(root) {
            continue;
        }
        if !is_watchable(path, root, options) {
            continue;
        }
        let watch_event = WatchEvent {
            kind,
            path: path.clone(),
        };
        debug!("File event: {:?}", watch_event);
        let _ = tx.send(watch_event);
    }
}

fn is_watchable(path: &Path, root: &Path, options: &IndexOptions) -> bool {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel,
        Err(_) => return false,
    };
    if options.is_ignored(rel) {
        return false;
    }
    if options.matches_extension(path) {
        return true;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| CONFIG_FILES.contains(&name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_watchable() {
        let options = IndexOptions::default();
        let root = Path::new("/proj");
        assert!(is_watchable(Path::new("/proj/src/a.ts"), root, &options));
        assert!(is_watchable(Path::new("/proj/tsconfig.json"), root, &options));
        assert!(is_watchable(Path::new("/proj/pkg/package.json"), root, &options));
        assert!(!is_watchable(Path::new("/proj/readme.md"), root, &options));
        assert!(!is_watchable(
            Path::new("/proj/node_modules/x/a.ts"),
            root,
            &options
        ));
        assert!(!is_watchable(Path::new("/proj/.symdex/index.db"), root, &options));
        assert!(!is_watchable(Path::new("/other/a.ts"), root, &options));
    }
}
