//! Per-file writer
//!
//! Converts extractor output into store rows: members flattened to
//! `Container.member`, signatures and fingerprints computed, detail payloads
//! encoded with unset fields omitted, destinations filtered to the project
//! root and assigned their owning project.

use crate::core::error::Result;
use crate::core::paths::{hash_string, to_relative};
use crate::extract::types::*;
use crate::project::boundaries::{resolve_file_project, ProjectBoundary};
use crate::store::relations::{self, RelationRow};
use crate::store::symbols::{self, SymbolRow};
use rusqlite::Connection;
use std::path::Path;

pub struct FileIndexer<'a> {
    pub root: &'a Path,
    pub boundaries: &'a [ProjectBoundary],
    pub default_project: &'a str,
}

impl<'a> FileIndexer<'a> {
    /// Write the symbol rows for one file, replacing whatever was there.
    pub fn index_file_symbols(
        &self,
        conn: &Connection,
        project: &str,
        rel_path: &str,
        content_hash: &str,
        extracted: &[SymbolInfo],
    ) -> Result<usize> {
        let rows = symbol_rows(project, rel_path, extracted);
        symbols::replace_file_symbols(conn, project, rel_path, content_hash, &rows)?;
        Ok(rows.len())
    }

    /// Write the relation rows for one file, replacing whatever was there.
    /// Out-of-root destinations are dropped.
    pub fn index_file_relations(
        &self,
        conn: &Connection,
        project: &str,
        rel_path: &str,
        drafts: &[RelationDraft],
    ) -> Result<usize> {
        let rows = self.relation_rows(project, drafts);
        relations::replace_file_relations(conn, project, rel_path, &rows)?;
        Ok(rows.len())
    }

    pub fn relation_rows(&self, project: &str, drafts: &[RelationDraft]) -> Vec<RelationRow> {
        let mut rows = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let dst_rel = to_relative(self.root, &draft.dst_path);
            if dst_rel.starts_with("..") {
                continue;
            }
            let dst_project =
                resolve_file_project(&dst_rel, self.boundaries, self.default_project);
            let meta_json = draft
                .meta
                .as_ref()
                .filter(|m| !m.is_empty())
                .and_then(|m| serde_json::to_string(m).ok());

            rows.push(RelationRow {
                project: project.to_string(),
                rel_type: draft.kind.as_str().to_string(),
                src_file_path: String::new(), // filled by the repo write
                src_symbol_name: draft.src_symbol.clone(),
                dst_project,
                dst_file_path: dst_rel,
                dst_symbol_name: draft.dst_symbol.clone(),
                meta_json,
            });
        }
        rows
    }
}

/// Flatten extracted symbols into store rows; container members become
/// additional rows named `Container.member`.
pub fn symbol_rows(project: &str, rel_path: &str, extracted: &[SymbolInfo]) -> Vec<SymbolRow> {
    let mut rows = Vec::new();
    for symbol in extracted {
        rows.push(to_row(project, rel_path, symbol, None));
        for member in &symbol.members {
            rows.push(to_row(project, rel_path, member, Some(symbol)));
        }
    }
    rows
}

fn to_row(
    project: &str,
    rel_path: &str,
    symbol: &SymbolInfo,
    container: Option<&SymbolInfo>,
) -> SymbolRow {
    let name = match container {
        Some(container) => format!("{}.{}", container.name, symbol.name),
        None => symbol.name.clone(),
    };
    // Members are reachable exactly when their container is
    let is_exported = container.map(|c| c.is_exported).unwrap_or(symbol.is_exported);
    let signature = compute_signature(symbol);
    let fingerprint = compute_fingerprint(&name, symbol.kind, signature.as_deref());
    let detail_json = encode_detail(symbol);

    SymbolRow {
        project: project.to_string(),
        file_path: rel_path.to_string(),
        name,
        kind: symbol.kind.as_str().to_string(),
        is_exported,
        fingerprint: Some(fingerprint),
        signature,
        detail_json,
        span_start_line: symbol.span.start.line as i64,
        span_start_col: symbol.span.start.column as i64,
        span_end_line: symbol.span.end.line as i64,
        span_end_col: symbol.span.end.column as i64,
        content_hash: None,
    }
}

/// Callables encode `params:N|async:0|1`; types and variables carry none.
pub fn compute_signature(symbol: &SymbolInfo) -> Option<String> {
    if !symbol.kind.is_callable() {
        return None;
    }
    let params = symbol.params.as_ref().map(|p| p.len()).unwrap_or(0);
    Some(format!(
        "params:{}|async:{}",
        params,
        if symbol.is_async { 1 } else { 0 }
    ))
}

/// Identity hash that survives file moves: name, kind and signature only.
pub fn compute_fingerprint(name: &str, kind: SymbolKind, signature: Option<&str>) -> String {
    hash_string(&format!(
        "{}|{}|{}",
        name,
        kind.as_str(),
        signature.unwrap_or("")
    ))
}

fn encode_detail(symbol: &SymbolInfo) -> Option<String> {
    let detail = SymbolDetail {
        params: symbol.params.clone(),
        return_type: symbol.return_type.clone(),
        modifiers: symbol.modifiers.clone(),
        heritage: symbol.heritage.clone(),
        decorators: symbol.decorators.clone(),
        members: symbol.members.iter().map(|m| m.name.clone()).collect(),
        type_params: symbol.type_params.clone(),
        method_kind: symbol.method_kind,
        js_doc: symbol.doc.clone(),
        is_async: symbol.is_async.then_some(true),
    };
    let json = serde_json::to_string(&detail).ok()?;
    if json == "{}" {
        None
    } else {
        Some(json)
    }
}
