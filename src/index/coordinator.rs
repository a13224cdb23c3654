//! Index coordinator
//!
//! Owns every mutating path into the store: debounced watcher drains,
//! coalesced full-index runs, and incremental runs with symbol diffing and
//! fingerprint retargeting. One logical worker at a time; watcher events
//! observed during a run are applied after it completes.

use crate::core::config::IndexOptions;
use crate::core::error::{Error, Result};
use crate::core::paths::{hash_bytes, to_absolute, to_relative};
use crate::extract::{extract_file, KnownFilesResolver};
use crate::graph::DependencyGraph;
use crate::index::indexer::FileIndexer;
use crate::parse::cache::ParseCache;
use crate::parse::{ParsedSource, SourceParser};
use crate::project::aliases::AliasCache;
use crate::project::boundaries::{
    discover_boundaries, resolve_file_project, ProjectBoundary,
};
use crate::store::files::{self, FileRow};
use crate::store::relations;
use crate::store::symbols::{self, SymbolRow};
use crate::store::Store;
use crate::watch::{WatchEvent, WatchEventKind};
use chrono::Utc;
use ignore::WalkBuilder;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Notify};
use tracing::{debug, error, info, warn};

/// One symbol-level change observed by a run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SymbolChange {
    pub file_path: String,
    pub name: String,
    pub kind: String,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ChangedSymbols {
    pub added: Vec<SymbolChange>,
    pub modified: Vec<SymbolChange>,
    pub removed: Vec<SymbolChange>,
}

impl ChangedSymbols {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Summary of one index run. Always produced unless the whole run fails.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexResult {
    pub indexed_files: usize,
    pub removed_files: usize,
    pub total_symbols: i64,
    pub total_relations: i64,
    pub duration_ms: u64,
    pub changed_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub failed_files: Vec<String>,
    pub changed_symbols: ChangedSymbols,
}

type IndexCallback = Box<dyn Fn(&IndexResult) + Send + Sync>;
type FullWaiter = oneshot::Sender<std::result::Result<IndexResult, String>>;

enum RunKind {
    Full,
    Incremental(Vec<WatchEvent>),
}

#[derive(Default)]
struct SchedState {
    indexing: bool,
    pending_events: Vec<WatchEvent>,
    pending_full: bool,
    full_waiters: Vec<FullWaiter>,
    debounce_gen: u64,
    shutdown: bool,
}

pub struct IndexCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    root: PathBuf,
    options: IndexOptions,
    store: Arc<Mutex<Store>>,
    boundaries: RwLock<Vec<ProjectBoundary>>,
    alias_cache: AliasCache,
    parse_cache: Mutex<ParseCache>,
    graph_cache: Arc<Mutex<HashMap<String, Arc<DependencyGraph>>>>,
    callbacks: Mutex<Vec<IndexCallback>>,
    state: Mutex<SchedState>,
    run_done: Notify,
}

impl IndexCoordinator {
    pub fn new(root: PathBuf, options: IndexOptions) -> Result<Self> {
        let store = Store::open(&options.db_path(&root))?;
        Self::with_store(root, options, store)
    }

    pub fn with_store(root: PathBuf, options: IndexOptions, store: Store) -> Result<Self> {
        let boundaries = discover_boundaries(&root, &options)?;
        let parse_cache = ParseCache::new(options.parse_cache_capacity);
        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                root,
                options,
                store: Arc::new(Mutex::new(store)),
                boundaries: RwLock::new(boundaries),
                alias_cache: AliasCache::new(),
                parse_cache: Mutex::new(parse_cache),
                graph_cache: Arc::new(Mutex::new(HashMap::new())),
                callbacks: Mutex::new(Vec::new()),
                state: Mutex::new(SchedState::default()),
                run_done: Notify::new(),
            }),
        })
    }

    /// Re-index the entire tree under a single transaction. Concurrent
    /// requests coalesce into the next scheduled full run.
    pub async fn full_index(&self) -> Result<IndexResult> {
        self.inner.clone().request_full().await
    }

    /// Re-index a changed subset. With `events = None`, drains whatever the
    /// watcher accumulated. When a run is already in flight the events are
    /// queued for the post-run drain and an empty summary is returned.
    pub async fn incremental_index(
        &self,
        events: Option<Vec<WatchEvent>>,
    ) -> Result<IndexResult> {
        let drained = {
            let mut state = self.inner.state.lock();
            if let Some(events) = events {
                state.pending_events.extend(events);
            }
            if state.indexing || state.pending_events.is_empty() {
                None
            } else {
                state.indexing = true;
                Some(std::mem::take(&mut state.pending_events))
            }
        };

        match drained {
            Some(events) => {
                self.inner
                    .clone()
                    .worker_cycle(RunKind::Incremental(events))
                    .await
            }
            None => Ok(IndexResult::default()),
        }
    }

    /// Re-index whatever changed on disk since the last run: the discovered
    /// tree is compared against the stored file rows and the difference is
    /// drained as synthetic watcher events. An empty store falls back to a
    /// full index.
    pub async fn scan_index(&self) -> Result<IndexResult> {
        let inner = self.inner.clone();
        let events = tokio::task::spawn_blocking(move || inner.scan_events())
            .await
            .map_err(|e| Error::Index(format!("scan task failed: {}", e)))??;

        match events {
            None => self.full_index().await,
            Some(events) if events.is_empty() => Ok(IndexResult::default()),
            Some(events) => self.incremental_index(Some(events)).await,
        }
    }

    /// Accept a watcher event: queue it and (re)arm the debounce timer.
    /// Config manifest changes trigger their side effects immediately.
    pub fn handle_watcher_event(&self, event: WatchEvent) {
        let file_name = event
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        match file_name.as_str() {
            "tsconfig.json" | "jsconfig.json" => {
                info!("Alias configuration changed; scheduling full reindex");
                self.inner.alias_cache.invalidate(&self.inner.root);
                let _ = self.inner.alias_cache.get(&self.inner.root);
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    if let Err(e) = inner.request_full().await {
                        error!("Full reindex after tsconfig change failed: {}", e);
                    }
                });
            }
            "package.json" => {
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    inner.refresh_boundaries().await;
                });
            }
            _ => {}
        }

        self.inner.state.lock().pending_events.push(event);
        self.inner.clone().arm_debounce();
    }

    /// Subscribe to run summaries. Callback panics are caught and logged.
    pub fn on_indexed<F>(&self, callback: F)
    where
        F: Fn(&IndexResult) + Send + Sync + 'static,
    {
        self.inner.callbacks.lock().push(Box::new(callback));
    }

    /// Stop the debouncer and wait for any in-flight run.
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
            state.debounce_gen += 1;
        }
        loop {
            let notified = self.inner.run_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.inner.state.lock().indexing {
                break;
            }
            notified.await;
        }
    }

    pub fn store(&self) -> Arc<Mutex<Store>> {
        self.inner.store.clone()
    }

    pub fn graph_cache(&self) -> Arc<Mutex<HashMap<String, Arc<DependencyGraph>>>> {
        self.inner.graph_cache.clone()
    }

    pub fn boundaries(&self) -> Vec<ProjectBoundary> {
        self.inner.boundaries.read().clone()
    }
}

struct PreRead {
    abs: PathBuf,
    rel: String,
    project: String,
    text: String,
    hash: String,
    mtime_ms: i64,
    size: i64,
    line_count: i64,
}

impl PreRead {
    fn file_row(&self) -> FileRow {
        FileRow {
            project: self.project.clone(),
            file_path: self.rel.clone(),
            mtime_ms: self.mtime_ms,
            size: self.size,
            content_hash: self.hash.clone(),
            updated_at: Utc::now().to_rfc3339(),
            line_count: Some(self.line_count),
        }
    }
}

impl CoordinatorInner {
    async fn request_full(self: Arc<Self>) -> Result<IndexResult> {
        let waiter = {
            let mut state = self.state.lock();
            if state.indexing {
                state.pending_full = true;
                let (tx, rx) = oneshot::channel();
                state.full_waiters.push(tx);
                Some(rx)
            } else {
                state.indexing = true;
                None
            }
        };

        match waiter {
            Some(rx) => match rx.await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(message)) => Err(Error::Index(message)),
                Err(_) => Err(Error::Index("index worker went away".to_string())),
            },
            None => self.worker_cycle(RunKind::Full).await,
        }
    }

    /// Run `first`, then drain queued work in order: a pending full index
    /// always precedes a pending incremental drain. Assumes the caller has
    /// already taken the indexing lock.
    async fn worker_cycle(self: Arc<Self>, first: RunKind) -> Result<IndexResult> {
        let mut kind = first;
        let mut first_result: Option<Result<IndexResult>> = None;

        loop {
            let waiters = match kind {
                RunKind::Full => {
                    let mut state = self.state.lock();
                    state.pending_full = false;
                    std::mem::take(&mut state.full_waiters)
                }
                RunKind::Incremental(_) => Vec::new(),
            };

            let result = self.clone().execute(kind).await;

            for waiter in waiters {
                let _ = waiter.send(match &result {
                    Ok(summary) => Ok(summary.clone()),
                    Err(e) => Err(e.to_string()),
                });
            }
            if let Ok(summary) = &result {
                self.dispatch_callbacks(summary);
            }

            if first_result.is_none() {
                first_result = Some(result);
            }

            let next = {
                let mut state = self.state.lock();
                if state.pending_full {
                    Some(RunKind::Full)
                } else if !state.pending_events.is_empty() && !state.shutdown {
                    Some(RunKind::Incremental(std::mem::take(
                        &mut state.pending_events,
                    )))
                } else {
                    state.indexing = false;
                    None
                }
            };

            match next {
                Some(next_kind) => kind = next_kind,
                None => break,
            }
        }

        self.run_done.notify_waiters();
        first_result.expect("worker cycle ran at least once")
    }

    async fn execute(self: Arc<Self>, kind: RunKind) -> Result<IndexResult> {
        tokio::task::spawn_blocking(move || match kind {
            RunKind::Full => self.run_full_blocking(),
            RunKind::Incremental(events) => self.run_incremental_blocking(events),
        })
        .await
        .map_err(|e| Error::Index(format!("index worker panicked: {}", e)))?
    }

    fn dispatch_callbacks(&self, result: &IndexResult) {
        let callbacks = self.callbacks.lock();
        for callback in callbacks.iter() {
            if catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
                error!("onIndexed callback panicked");
            }
        }
    }

    fn arm_debounce(self: Arc<Self>) {
        let generation = {
            let mut state = self.state.lock();
            if state.shutdown {
                return;
            }
            state.debounce_gen += 1;
            state.debounce_gen
        };
        let delay = Duration::from_millis(self.options.debounce_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            self.flush_debounced(generation).await;
        });
    }

    async fn flush_debounced(self: Arc<Self>, generation: u64) {
        let events = {
            let mut state = self.state.lock();
            if state.debounce_gen != generation || state.shutdown {
                return;
            }
            // A running worker drains pending events when it finishes
            if state.indexing || state.pending_events.is_empty() {
                return;
            }
            state.indexing = true;
            std::mem::take(&mut state.pending_events)
        };
        if let Err(e) = self.worker_cycle(RunKind::Incremental(events)).await {
            error!("Incremental index failed: {}", e);
        }
    }

    async fn refresh_boundaries(self: Arc<Self>) {
        let root = self.root.clone();
        let options = self.options.clone();
        let discovered =
            tokio::task::spawn_blocking(move || discover_boundaries(&root, &options)).await;
        match discovered {
            Ok(Ok(boundaries)) => {
                debug!("Refreshed {} project boundaries", boundaries.len());
                *self.boundaries.write() = boundaries;
            }
            Ok(Err(e)) => warn!("Boundary refresh failed: {}", e),
            Err(e) => warn!("Boundary refresh task failed: {}", e),
        }
    }

    /// Diff the tree on disk against the stored file rows. `None` means
    /// there is no baseline to diff against (empty store).
    fn scan_events(&self) -> Result<Option<Vec<WatchEvent>>> {
        let stored = {
            let store = self.store.lock();
            files::get_all_files(store.conn())?
        };
        if stored.is_empty() {
            return Ok(None);
        }

        let discovered = discover_source_files(&self.root, &self.options)?;
        let by_path: HashMap<&str, &FileRow> = stored
            .iter()
            .map(|row| (row.file_path.as_str(), row))
            .collect();

        let mut events = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for abs in &discovered {
            let rel = to_relative(&self.root, abs);
            let kind = match by_path.get(rel.as_str()) {
                None => Some(WatchEventKind::Create),
                Some(row) => {
                    // Same mtime derivation as the pre-read path
                    let changed = std::fs::metadata(abs)
                        .ok()
                        .map(|meta| {
                            let mtime_ms = meta
                                .modified()
                                .ok()
                                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                                .map(|d| d.as_millis() as i64)
                                .unwrap_or(0);
                            mtime_ms != row.mtime_ms || meta.len() as i64 != row.size
                        })
                        .unwrap_or(true);
                    changed.then_some(WatchEventKind::Change)
                }
            };
            seen.insert(rel);
            if let Some(kind) = kind {
                events.push(WatchEvent {
                    kind,
                    path: abs.clone(),
                });
            }
        }

        for row in &stored {
            if !seen.contains(&row.file_path) {
                events.push(WatchEvent {
                    kind: WatchEventKind::Delete,
                    path: to_absolute(&self.root, &row.file_path),
                });
            }
        }

        debug!("Scan found {} offline change(s)", events.len());
        Ok(Some(events))
    }

    fn default_project(&self, boundaries: &[ProjectBoundary]) -> String {
        boundaries
            .iter()
            .find(|b| b.dir == ".")
            .map(|b| b.name.clone())
            .unwrap_or_else(|| {
                self.root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "root".to_string())
            })
    }

    // -----------------------------------------------------------------------
    // Full index
    // -----------------------------------------------------------------------

    fn run_full_blocking(&self) -> Result<IndexResult> {
        let start = Instant::now();
        let boundaries = self.boundaries.read().clone();
        let default_project = self.default_project(&boundaries);
        let aliases = self.alias_cache.get(&self.root);

        let discovered = discover_source_files(&self.root, &self.options)?;
        let (pre, mut failed) = self.pre_read_all(&discovered, &boundaries, &default_project);
        info!(
            "Full index: {} files ({} unreadable)",
            pre.len(),
            failed.len()
        );

        let mut indexed_files = Vec::new();
        let mut parsed_files: Vec<(String, Arc<ParsedSource>)> = Vec::new();
        let mut changed_symbols = ChangedSymbols::default();
        let deleted_files;
        let total_symbols;
        let total_relations;

        {
            let mut store = self.store.lock();
            let tx = store.transaction()?;

            // Remove files that vanished from disk, and rows stranded under
            // a project whose boundary moved
            let old_files = files::get_all_files(&tx)?;
            let present: HashMap<&str, &str> = pre
                .iter()
                .map(|p| (p.rel.as_str(), p.project.as_str()))
                .collect();
            let mut removed = Vec::new();
            for old in &old_files {
                let current_project = present.get(old.file_path.as_str());
                if current_project != Some(&old.project.as_str()) {
                    symbols::delete_file_symbols(&tx, &old.project, &old.file_path)?;
                    relations::delete_file_relations(&tx, &old.project, &old.file_path)?;
                    files::delete_file(&tx, &old.project, &old.file_path)?;
                    if current_project.is_none() {
                        removed.push(old.file_path.clone());
                    }
                }
            }
            deleted_files = removed;

            // Before-state for the idempotence diff
            let mut before: HashMap<String, Vec<SymbolRow>> = HashMap::new();
            for p in &pre {
                before.insert(p.rel.clone(), symbols::get_file_symbols(&tx, &p.project, &p.rel)?);
            }

            // Delete only rows being re-inserted, then Pass 1: upsert files
            for p in &pre {
                symbols::delete_file_symbols(&tx, &p.project, &p.rel)?;
                relations::delete_file_relations(&tx, &p.project, &p.rel)?;
                files::delete_file(&tx, &p.project, &p.rel)?;
            }
            for p in &pre {
                files::upsert_file(&tx, &p.file_row())?;
            }

            // Pass 2 resolves against the freshly written file set
            let known = files::get_files_map(&tx)?;
            let resolver = KnownFilesResolver {
                root: self.root.clone(),
                known,
                aliases: aliases.clone(),
            };
            let indexer = FileIndexer {
                root: &self.root,
                boundaries: &boundaries,
                default_project: &default_project,
            };

            for p in &pre {
                match SourceParser::parse(&p.abs, p.text.clone()) {
                    Ok(parsed) => {
                        let extraction = extract_file(&parsed, &p.abs, &resolver);
                        indexer.index_file_symbols(
                            &tx,
                            &p.project,
                            &p.rel,
                            &p.hash,
                            &extraction.symbols,
                        )?;
                        indexer.index_file_relations(
                            &tx,
                            &p.project,
                            &p.rel,
                            &extraction.relations,
                        )?;
                        parsed_files.push((p.rel.clone(), Arc::new(parsed)));
                        indexed_files.push(p.rel.clone());
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", p.rel, e);
                        failed.push(p.rel.clone());
                    }
                }
            }

            for p in &pre {
                let after = symbols::get_file_symbols(&tx, &p.project, &p.rel)?;
                diff_symbols(
                    &p.rel,
                    before.get(&p.rel).map(Vec::as_slice).unwrap_or(&[]),
                    &after,
                    &mut changed_symbols,
                );
            }

            total_symbols = symbols::count_symbols(&tx, None)?;
            total_relations = relations::count_relations(&tx, None)?;
            tx.commit()?;
        }

        // Outside the transaction: fresh parse cache, stale graph cache
        {
            let mut cache = self.parse_cache.lock();
            cache.clear();
            for (rel, parsed) in parsed_files {
                cache.set(rel, parsed);
            }
        }
        self.graph_cache.lock().clear();

        Ok(IndexResult {
            indexed_files: indexed_files.len(),
            removed_files: deleted_files.len(),
            total_symbols,
            total_relations,
            duration_ms: start.elapsed().as_millis() as u64,
            changed_files: indexed_files,
            deleted_files,
            failed_files: failed,
            changed_symbols,
        })
    }

    // -----------------------------------------------------------------------
    // Incremental index
    // -----------------------------------------------------------------------

    fn run_incremental_blocking(&self, events: Vec<WatchEvent>) -> Result<IndexResult> {
        let start = Instant::now();
        let boundaries = self.boundaries.read().clone();
        let default_project = self.default_project(&boundaries);
        let aliases = self.alias_cache.get(&self.root);

        // Last event per path wins between the changed and deleted sets
        let mut changed_paths: Vec<PathBuf> = Vec::new();
        let mut deleted_paths: Vec<PathBuf> = Vec::new();
        for event in events {
            if !event.path.starts_with(&self.root) || !self.options.matches_extension(&event.path)
            {
                continue;
            }
            let rel = event.path.strip_prefix(&self.root).unwrap_or(&event.path);
            if self.options.is_ignored(rel) {
                continue;
            }
            match event.kind {
                WatchEventKind::Create | WatchEventKind::Change => {
                    deleted_paths.retain(|p| p != &event.path);
                    if !changed_paths.contains(&event.path) {
                        changed_paths.push(event.path);
                    }
                }
                WatchEventKind::Delete => {
                    changed_paths.retain(|p| p != &event.path);
                    if !deleted_paths.contains(&event.path) {
                        deleted_paths.push(event.path);
                    }
                }
            }
        }

        if changed_paths.is_empty() && deleted_paths.is_empty() {
            return Ok(IndexResult::default());
        }

        let deleted: Vec<(String, String)> = deleted_paths
            .iter()
            .map(|abs| {
                let rel = to_relative(&self.root, abs);
                let project = resolve_file_project(&rel, &boundaries, &default_project);
                (project, rel)
            })
            .collect();

        let (pre, mut failed) = self.pre_read_all(&changed_paths, &boundaries, &default_project);

        let mut indexed_files = Vec::new();
        let mut parsed_files: Vec<(String, Arc<ParsedSource>)> = Vec::new();
        let mut changed_symbols = ChangedSymbols::default();
        let total_symbols;
        let total_relations;

        {
            let mut store = self.store.lock();
            let tx = store.transaction()?;

            // Deleted symbols drive fingerprint retargeting afterwards
            let mut deleted_symbols: Vec<SymbolRow> = Vec::new();
            for (project, rel) in &deleted {
                deleted_symbols.extend(symbols::get_file_symbols(&tx, project, rel)?);
            }

            let mut before: HashMap<String, Vec<SymbolRow>> = HashMap::new();
            for p in &pre {
                before.insert(p.rel.clone(), symbols::get_file_symbols(&tx, &p.project, &p.rel)?);
            }

            // Deletions first: symbols and outgoing relations. The file row
            // itself goes last, after retargeting, so incoming relations can
            // follow a renamed symbol instead of being cascade-deleted.
            for (project, rel) in &deleted {
                symbols::delete_file_symbols(&tx, project, rel)?;
                relations::delete_file_relations(&tx, project, rel)?;
            }

            for p in &pre {
                files::upsert_file(&tx, &p.file_row())?;
            }

            let mut known = files::get_files_map(&tx)?;
            for (_, rel) in &deleted {
                known.remove(rel);
            }
            let resolver = KnownFilesResolver {
                root: self.root.clone(),
                known,
                aliases: aliases.clone(),
            };
            let indexer = FileIndexer {
                root: &self.root,
                boundaries: &boundaries,
                default_project: &default_project,
            };

            for p in &pre {
                match SourceParser::parse(&p.abs, p.text.clone()) {
                    Ok(parsed) => {
                        let extraction = extract_file(&parsed, &p.abs, &resolver);
                        indexer.index_file_symbols(
                            &tx,
                            &p.project,
                            &p.rel,
                            &p.hash,
                            &extraction.symbols,
                        )?;
                        indexer.index_file_relations(
                            &tx,
                            &p.project,
                            &p.rel,
                            &extraction.relations,
                        )?;
                        parsed_files.push((p.rel.clone(), Arc::new(parsed)));
                        indexed_files.push(p.rel.clone());
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", p.rel, e);
                        failed.push(p.rel.clone());
                    }
                }
            }

            // Fingerprint retargeting: a symbol that moved files wholesale
            // drags its incoming relations along
            for old in &deleted_symbols {
                let Some(fingerprint) = &old.fingerprint else {
                    continue;
                };
                let matches = symbols::get_by_fingerprint(&tx, &old.project, fingerprint)?;
                if matches.len() == 1 && matches[0].file_path != old.file_path {
                    let moved = relations::retarget_relations(
                        &tx,
                        &old.project,
                        &old.file_path,
                        &old.name,
                        &matches[0].file_path,
                        &matches[0].name,
                    )?;
                    if moved > 0 {
                        debug!(
                            "Retargeted {} relations: {}#{} -> {}#{}",
                            moved, old.file_path, old.name, matches[0].file_path, matches[0].name
                        );
                    }
                }
            }

            // Now the file rows; the cascade sweeps whatever still points at
            // a file that is truly gone
            for (project, rel) in &deleted {
                files::delete_file(&tx, project, rel)?;
            }

            for p in &pre {
                let after = symbols::get_file_symbols(&tx, &p.project, &p.rel)?;
                diff_symbols(
                    &p.rel,
                    before.get(&p.rel).map(Vec::as_slice).unwrap_or(&[]),
                    &after,
                    &mut changed_symbols,
                );
            }

            total_symbols = symbols::count_symbols(&tx, None)?;
            total_relations = relations::count_relations(&tx, None)?;
            tx.commit()?;
        }

        {
            let mut cache = self.parse_cache.lock();
            for (_, rel) in &deleted {
                cache.remove(rel);
            }
            for (rel, parsed) in parsed_files {
                cache.set(rel, parsed);
            }
        }
        self.graph_cache.lock().clear();

        Ok(IndexResult {
            indexed_files: indexed_files.len(),
            removed_files: deleted.len(),
            total_symbols,
            total_relations,
            duration_ms: start.elapsed().as_millis() as u64,
            changed_files: indexed_files,
            deleted_files: deleted.into_iter().map(|(_, rel)| rel).collect(),
            failed_files: failed,
            changed_symbols,
        })
    }

    /// Concurrent read + hash of the given files; unreadable files are
    /// reported, not fatal.
    fn pre_read_all(
        &self,
        paths: &[PathBuf],
        boundaries: &[ProjectBoundary],
        default_project: &str,
    ) -> (Vec<PreRead>, Vec<String>) {
        let reads: Vec<std::result::Result<PreRead, String>> = paths
            .par_iter()
            .map(|abs| {
                let rel = to_relative(&self.root, abs);
                pre_read(abs, &rel, boundaries, default_project).map_err(|e| {
                    warn!("Pre-read failed for {}: {}", rel, e);
                    rel
                })
            })
            .collect();

        let mut pre = Vec::new();
        let mut failed = Vec::new();
        for read in reads {
            match read {
                Ok(p) => pre.push(p),
                Err(rel) => failed.push(rel),
            }
        }
        (pre, failed)
    }
}

fn pre_read(
    abs: &Path,
    rel: &str,
    boundaries: &[ProjectBoundary],
    default_project: &str,
) -> std::io::Result<PreRead> {
    let text = std::fs::read_to_string(abs)?;
    let meta = std::fs::metadata(abs)?;
    let mtime_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    Ok(PreRead {
        abs: abs.to_path_buf(),
        rel: rel.to_string(),
        project: resolve_file_project(rel, boundaries, default_project),
        hash: hash_bytes(text.as_bytes()),
        line_count: text.lines().count() as i64,
        size: meta.len() as i64,
        mtime_ms,
        text,
    })
}

/// Walk the tree for indexable sources, honoring gitignore and the
/// configured exclusions.
fn discover_source_files(root: &Path, options: &IndexOptions) -> Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    let ignored: Vec<String> = options
        .ignore_dirs
        .iter()
        .cloned()
        .chain(std::iter::once(options.data_dir.clone()))
        .collect();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(move |entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !ignored.iter().any(|d| d == name))
                .unwrap_or(true)
        })
        .build();

    for entry in walker.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        if options.matches_extension(path) {
            result.push(path.to_path_buf());
        }
    }
    result.sort();
    Ok(result)
}

/// Per-file diff of symbol rows keyed by name; `modified` means the
/// fingerprint changed.
fn diff_symbols(
    file: &str,
    before: &[SymbolRow],
    after: &[SymbolRow],
    out: &mut ChangedSymbols,
) {
    let before_by_name: HashMap<&str, &SymbolRow> =
        before.iter().map(|s| (s.name.as_str(), s)).collect();
    let after_by_name: HashMap<&str, &SymbolRow> =
        after.iter().map(|s| (s.name.as_str(), s)).collect();

    for row in after {
        match before_by_name.get(row.name.as_str()) {
            None => out.added.push(change_of(file, row)),
            Some(old) if old.fingerprint != row.fingerprint => {
                out.modified.push(change_of(file, row))
            }
            Some(_) => {}
        }
    }
    for row in before {
        if !after_by_name.contains_key(row.name.as_str()) {
            out.removed.push(change_of(file, row));
        }
    }
}

fn change_of(file: &str, row: &SymbolRow) -> SymbolChange {
    SymbolChange {
        file_path: file.to_string(),
        name: row.name.clone(),
        kind: row.kind.clone(),
        fingerprint: row.fingerprint.clone(),
    }
}
