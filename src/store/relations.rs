//! Relation rows
//!
//! Rows are replaced per source file on each successful index. The write
//! path deduplicates on the composite identity (type, symbols, destination,
//! meta hash) so one extraction never produces twin rows.

use crate::core::error::Result;
use crate::core::paths::hash_string;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, Row};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRow {
    pub project: String,
    pub rel_type: String,
    pub src_file_path: String,
    pub src_symbol_name: Option<String>,
    pub dst_project: String,
    pub dst_file_path: String,
    pub dst_symbol_name: Option<String>,
    pub meta_json: Option<String>,
}

impl RelationRow {
    fn identity(&self) -> String {
        format!(
            "{}\u{0}{}\u{0}{}\u{0}{}\u{0}{}\u{0}{}\u{0}{}",
            self.rel_type,
            self.src_file_path,
            self.src_symbol_name.as_deref().unwrap_or(""),
            self.dst_project,
            self.dst_file_path,
            self.dst_symbol_name.as_deref().unwrap_or(""),
            hash_string(self.meta_json.as_deref().unwrap_or("")),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelationQuery {
    pub project: Option<String>,
    pub rel_type: Option<String>,
    pub src_file: Option<String>,
    pub dst_file: Option<String>,
    pub src_symbol: Option<String>,
    pub dst_symbol: Option<String>,
    pub limit: Option<usize>,
}

fn from_row(row: &Row) -> rusqlite::Result<RelationRow> {
    Ok(RelationRow {
        project: row.get("project")?,
        rel_type: row.get("rel_type")?,
        src_file_path: row.get("src_file_path")?,
        src_symbol_name: row.get("src_symbol_name")?,
        dst_project: row.get("dst_project")?,
        dst_file_path: row.get("dst_file_path")?,
        dst_symbol_name: row.get("dst_symbol_name")?,
        meta_json: row.get("meta_json")?,
    })
}

/// Replace every relation originating from `src_file` with the given set.
pub fn replace_file_relations(
    conn: &Connection,
    project: &str,
    src_file: &str,
    rows: &[RelationRow],
) -> Result<()> {
    conn.execute(
        "DELETE FROM relations WHERE project = ?1 AND src_file_path = ?2",
        params![project, src_file],
    )?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO relations (project, rel_type, src_file_path, src_symbol_name,
                                dst_project, dst_file_path, dst_symbol_name, meta_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for row in rows {
        if !seen.insert(row.identity()) {
            continue;
        }
        stmt.execute(params![
            project,
            row.rel_type,
            src_file,
            row.src_symbol_name,
            row.dst_project,
            row.dst_file_path,
            row.dst_symbol_name,
            row.meta_json,
        ])?;
    }
    Ok(())
}

pub fn delete_file_relations(conn: &Connection, project: &str, src_file: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM relations WHERE project = ?1 AND src_file_path = ?2",
        params![project, src_file],
    )?;
    Ok(())
}

/// Relations of one type; `project = None` spans all projects.
pub fn get_by_type(
    conn: &Connection,
    project: Option<&str>,
    rel_type: &str,
) -> Result<Vec<RelationRow>> {
    let query = RelationQuery {
        project: project.map(String::from),
        rel_type: Some(rel_type.to_string()),
        ..Default::default()
    };
    search_relations(conn, &query)
}

/// Edges the dependency graph is built from: imports, type references and
/// re-exports.
pub fn get_module_edges(conn: &Connection, project: Option<&str>) -> Result<Vec<RelationRow>> {
    let mut sql = String::from(
        "SELECT * FROM relations WHERE rel_type IN ('imports', 'type-references', 're-exports')",
    );
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(project) = project {
        sql.push_str(" AND project = ?");
        params.push(Box::new(project.to_string()));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
            from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Relations that stay inside one file.
pub fn get_internal_relations(
    conn: &Connection,
    project: &str,
    file: &str,
) -> Result<Vec<RelationRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM relations
         WHERE project = ?1 AND src_file_path = ?2 AND dst_file_path = ?2 AND dst_project = project",
    )?;
    let rows = stmt
        .query_map(params![project, file], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Point every relation targeting `(old_file, old_symbol)` at the symbol's
/// new home; used by rename retargeting.
pub fn retarget_relations(
    conn: &Connection,
    dst_project: &str,
    old_file: &str,
    old_symbol: &str,
    new_file: &str,
    new_symbol: &str,
) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE relations SET dst_file_path = ?1, dst_symbol_name = ?2
         WHERE dst_project = ?3 AND dst_file_path = ?4 AND dst_symbol_name = ?5",
        params![new_file, new_symbol, dst_project, old_file, old_symbol],
    )?;
    Ok(updated)
}

pub fn count_relations(conn: &Connection, project: Option<&str>) -> Result<i64> {
    let count = match project {
        Some(project) => conn.query_row(
            "SELECT COUNT(*) FROM relations WHERE project = ?1",
            params![project],
            |r| r.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM relations", [], |r| r.get(0))?,
    };
    Ok(count)
}

pub fn search_relations(conn: &Connection, query: &RelationQuery) -> Result<Vec<RelationRow>> {
    let mut sql = String::from("SELECT * FROM relations");
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(project) = &query.project {
        clauses.push("project = ?");
        params.push(Box::new(project.clone()));
    }
    if let Some(rel_type) = &query.rel_type {
        clauses.push("rel_type = ?");
        params.push(Box::new(rel_type.clone()));
    }
    if let Some(src_file) = &query.src_file {
        clauses.push("src_file_path = ?");
        params.push(Box::new(src_file.clone()));
    }
    if let Some(dst_file) = &query.dst_file {
        clauses.push("dst_file_path = ?");
        params.push(Box::new(dst_file.clone()));
    }
    if let Some(src_symbol) = &query.src_symbol {
        clauses.push("src_symbol_name = ?");
        params.push(Box::new(src_symbol.clone()));
    }
    if let Some(dst_symbol) = &query.dst_symbol {
        clauses.push("dst_symbol_name = ?");
        params.push(Box::new(dst_symbol.clone()));
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY src_file_path, rel_type, dst_file_path");
    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        params.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
            from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
