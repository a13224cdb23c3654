//! Read-only query layer
//!
//! Projections over the store plus graph-backed analyses. Every public
//! operation fails fast once the handle is closed. The dependency graph is
//! built on demand and cached until an index run invalidates it.

use crate::core::error::{Error, Result};
use crate::extract::types::{DocBlock, HeritageKind, HeritageRef, MethodKind, ParamInfo, SymbolDetail};
use crate::graph::{DependencyGraph, FanMetrics};
use crate::store::files;
use crate::store::relations::{self, RelationQuery, RelationRow};
use crate::store::symbols::{self, SymbolQuery, SymbolRow};
use crate::store::Store;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

const CROSS_PROJECT_KEY: &str = "*";

/// Optional enrichment seam: supplies a resolved type for a symbol. Failures
/// never surface to callers.
pub trait SemanticResolver: Send + Sync {
    fn resolved_type(&self, file: &str, name: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProjectStats {
    pub project: String,
    pub files: i64,
    pub symbols: i64,
    pub relations: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileStats {
    pub project: String,
    pub file_path: String,
    pub line_count: i64,
    pub size: i64,
    pub symbol_count: i64,
    pub outgoing_relations: i64,
    pub incoming_relations: i64,
}

/// A symbol row with its detail payload reconstituted.
#[derive(Debug, Clone)]
pub struct FullSymbol {
    pub row: SymbolRow,
    pub detail: SymbolDetail,
    pub resolved_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModuleInterfaceEntry {
    pub name: String,
    pub kind: String,
    pub params: Option<Vec<ParamInfo>>,
    pub return_type: Option<String>,
    pub js_doc: Option<DocBlock>,
}

pub struct QueryEngine {
    store: Arc<Mutex<Store>>,
    graph_cache: Arc<Mutex<HashMap<String, Arc<DependencyGraph>>>>,
    default_project: String,
    semantic: Option<Box<dyn SemanticResolver>>,
    closed: AtomicBool,
}

impl QueryEngine {
    pub fn new(
        store: Arc<Mutex<Store>>,
        graph_cache: Arc<Mutex<HashMap<String, Arc<DependencyGraph>>>>,
        default_project: String,
    ) -> Self {
        Self {
            store,
            graph_cache,
            default_project,
            semantic: None,
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_semantic(mut self, semantic: Box<dyn SemanticResolver>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    /// Close the handle; every subsequent call fails with the closed kind.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub fn get_stats(&self) -> Result<Vec<ProjectStats>> {
        self.check_open()?;
        let store = self.store.lock();
        let conn = store.conn();
        let mut stats = Vec::new();
        for project in files::list_projects(conn)? {
            stats.push(ProjectStats {
                files: files::count_files(conn, Some(&project))?,
                symbols: symbols::count_symbols(conn, Some(&project))?,
                relations: relations::count_relations(conn, Some(&project))?,
                project,
            });
        }
        Ok(stats)
    }

    pub fn get_file_stats(&self, file: &str) -> Result<FileStats> {
        self.check_open()?;
        let store = self.store.lock();
        let conn = store.conn();

        let row = files::get_all_files(conn)?
            .into_iter()
            .find(|f| f.file_path == file)
            .ok_or_else(|| Error::FileNotFound(file.to_string()))?;

        let symbol_count = symbols::get_file_symbols(conn, &row.project, &row.file_path)?.len() as i64;
        let outgoing = relations::search_relations(
            conn,
            &RelationQuery {
                project: Some(row.project.clone()),
                src_file: Some(row.file_path.clone()),
                ..Default::default()
            },
        )?
        .len() as i64;
        let incoming = relations::search_relations(
            conn,
            &RelationQuery {
                dst_file: Some(row.file_path.clone()),
                ..Default::default()
            },
        )?
        .len() as i64;

        Ok(FileStats {
            project: row.project,
            file_path: row.file_path,
            line_count: row.line_count.unwrap_or(0),
            size: row.size,
            symbol_count,
            outgoing_relations: outgoing,
            incoming_relations: incoming,
        })
    }

    // -----------------------------------------------------------------------
    // Symbol & relation search
    // -----------------------------------------------------------------------

    /// Project-scoped symbol search; the engine's default project applies
    /// when the query names none.
    pub fn search_symbols(&self, mut query: SymbolQuery) -> Result<Vec<SymbolRow>> {
        self.check_open()?;
        if query.project.is_none() {
            query.project = Some(self.default_project.clone());
        }
        let store = self.store.lock();
        symbols::search_symbols(store.conn(), &query)
    }

    /// Symbol search across every project.
    pub fn search_all_symbols(&self, mut query: SymbolQuery) -> Result<Vec<SymbolRow>> {
        self.check_open()?;
        query.project = None;
        let store = self.store.lock();
        symbols::search_symbols(store.conn(), &query)
    }

    pub fn search_relations(&self, mut query: RelationQuery) -> Result<Vec<RelationRow>> {
        self.check_open()?;
        if query.project.is_none() {
            query.project = Some(self.default_project.clone());
        }
        let store = self.store.lock();
        relations::search_relations(store.conn(), &query)
    }

    pub fn search_all_relations(&self, mut query: RelationQuery) -> Result<Vec<RelationRow>> {
        self.check_open()?;
        query.project = None;
        let store = self.store.lock();
        relations::search_relations(store.conn(), &query)
    }

    pub fn get_symbols_by_file(&self, file: &str) -> Result<Vec<SymbolRow>> {
        self.search_all_symbols(SymbolQuery {
            file: Some(file.to_string()),
            ..Default::default()
        })
    }

    pub fn get_internal_relations(&self, file: &str) -> Result<Vec<RelationRow>> {
        self.check_open()?;
        let store = self.store.lock();
        let conn = store.conn();
        for project in files::list_projects(conn)? {
            let rows = relations::get_internal_relations(conn, &project, file)?;
            if !rows.is_empty() {
                return Ok(rows);
            }
        }
        Ok(Vec::new())
    }

    /// Exact symbol lookup with the detail payload decoded. Wrong-typed
    /// detail fields are ignored silently; semantic enrichment failures are
    /// swallowed.
    pub fn get_full_symbol(&self, name: &str, file: &str) -> Result<Option<FullSymbol>> {
        self.check_open()?;
        let row = {
            let store = self.store.lock();
            let conn = store.conn();
            let mut found = None;
            for project in files::list_projects(conn)? {
                if let Some(row) = symbols::get_symbol(conn, &project, file, name)? {
                    found = Some(row);
                    break;
                }
            }
            found
        };

        let Some(row) = row else {
            return Ok(None);
        };

        let detail = row
            .detail_json
            .as_deref()
            .map(decode_detail)
            .unwrap_or_default();

        let resolved_type = self.semantic.as_ref().and_then(|semantic| {
            match semantic.resolved_type(file, name) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!("Semantic enrichment failed for {}#{}: {}", file, name, e);
                    None
                }
            }
        });

        Ok(Some(FullSymbol {
            row,
            detail,
            resolved_type,
        }))
    }

    /// Exported symbols of a file, projected for consumers.
    pub fn get_module_interface(&self, file: &str) -> Result<Vec<ModuleInterfaceEntry>> {
        let rows = self.search_all_symbols(SymbolQuery {
            file: Some(file.to_string()),
            exported_only: true,
            ..Default::default()
        })?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let detail = row
                    .detail_json
                    .as_deref()
                    .map(decode_detail)
                    .unwrap_or_default();
                ModuleInterfaceEntry {
                    name: row.name,
                    kind: row.kind,
                    params: detail.params,
                    return_type: detail.return_type,
                    js_doc: detail.js_doc,
                }
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Graph queries
    // -----------------------------------------------------------------------

    /// Direct dependencies via relation rows (no graph build needed).
    pub fn get_dependencies(&self, file: &str) -> Result<Vec<String>> {
        self.check_open()?;
        let store = self.store.lock();
        let rows = relations::get_module_edges(store.conn(), None)?;
        let mut deps: Vec<String> = rows
            .into_iter()
            .filter(|r| r.src_file_path == file)
            .map(|r| r.dst_file_path)
            .collect();
        deps.sort();
        deps.dedup();
        Ok(deps)
    }

    /// Direct dependents via relation rows.
    pub fn get_dependents(&self, file: &str) -> Result<Vec<String>> {
        self.check_open()?;
        let store = self.store.lock();
        let rows = relations::get_module_edges(store.conn(), None)?;
        let mut deps: Vec<String> = rows
            .into_iter()
            .filter(|r| r.dst_file_path == file)
            .map(|r| r.src_file_path)
            .collect();
        deps.sort();
        deps.dedup();
        Ok(deps)
    }

    pub fn get_affected(&self, files: &[String]) -> Result<Vec<String>> {
        Ok(self.graph()?.get_affected_by_change(files))
    }

    pub fn get_transitive_dependencies(&self, file: &str) -> Result<Vec<String>> {
        Ok(self.graph()?.get_transitive_dependencies(file))
    }

    pub fn has_cycle(&self) -> Result<bool> {
        Ok(self.graph()?.has_cycle())
    }

    pub fn get_cycle_paths(&self, max_cycles: Option<usize>) -> Result<Vec<Vec<String>>> {
        Ok(self.graph()?.get_cycle_paths(max_cycles))
    }

    pub fn get_import_graph(&self) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.graph()?.get_adjacency_list())
    }

    pub fn get_fan_metrics(&self, file: &str) -> Result<FanMetrics> {
        Ok(self.graph()?.get_fan_metrics(file))
    }

    /// Build-or-reuse the cross-project dependency graph. Index runs clear
    /// the cache; the next query rebuilds.
    fn graph(&self) -> Result<Arc<DependencyGraph>> {
        self.check_open()?;
        if let Some(graph) = self.graph_cache.lock().get(CROSS_PROJECT_KEY) {
            return Ok(graph.clone());
        }

        let rows = {
            let store = self.store.lock();
            relations::get_module_edges(store.conn(), None)?
        };
        let graph = Arc::new(DependencyGraph::from_relations(&rows));
        self.graph_cache
            .lock()
            .insert(CROSS_PROJECT_KEY.to_string(), graph.clone());
        Ok(graph)
    }
}

/// Defensive decode of a detail payload: each field is taken only when it
/// has the expected shape, malformed JSON yields the empty detail.
fn decode_detail(json: &str) -> SymbolDetail {
    let value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed detail payload ignored: {}", e);
            return SymbolDetail::default();
        }
    };

    let mut detail = SymbolDetail::default();
    let Some(map) = value.as_object() else {
        return detail;
    };

    if let Some(params) = map.get("params").and_then(Value::as_array) {
        let parsed: Vec<ParamInfo> = params
            .iter()
            .filter_map(|p| serde_json::from_value(p.clone()).ok())
            .collect();
        if !parsed.is_empty() {
            detail.params = Some(parsed);
        }
    }
    if let Some(return_type) = map.get("returnType").and_then(Value::as_str) {
        detail.return_type = Some(return_type.to_string());
    }
    if let Some(modifiers) = map.get("modifiers").and_then(Value::as_array) {
        detail.modifiers = modifiers
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect();
    }
    if let Some(heritage) = map.get("heritage").and_then(Value::as_array) {
        detail.heritage = heritage
            .iter()
            .filter_map(|h| {
                let kind = match h.get("kind").and_then(Value::as_str)? {
                    "extends" => HeritageKind::Extends,
                    "implements" => HeritageKind::Implements,
                    _ => return None,
                };
                Some(HeritageRef {
                    kind,
                    name: h.get("name").and_then(Value::as_str)?.to_string(),
                })
            })
            .collect();
    }
    if let Some(decorators) = map.get("decorators").and_then(Value::as_array) {
        detail.decorators = decorators
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect();
    }
    if let Some(members) = map.get("members").and_then(Value::as_array) {
        detail.members = members
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect();
    }
    if let Some(type_params) = map.get("typeParams").and_then(Value::as_array) {
        let parsed: Vec<String> = type_params
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect();
        if !parsed.is_empty() {
            detail.type_params = Some(parsed);
        }
    }
    if let Some(method_kind) = map.get("methodKind").and_then(Value::as_str) {
        detail.method_kind = match method_kind {
            "constructor" => Some(MethodKind::Constructor),
            "getter" => Some(MethodKind::Getter),
            "setter" => Some(MethodKind::Setter),
            "method" => Some(MethodKind::Method),
            _ => None,
        };
    }
    if let Some(js_doc) = map.get("jsDoc") {
        detail.js_doc = serde_json::from_value(js_doc.clone()).ok();
    }
    if let Some(is_async) = map.get("isAsync").and_then(Value::as_bool) {
        detail.is_async = Some(is_async);
    }

    detail
}
