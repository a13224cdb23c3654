//! Symbol rows and full-text search

use crate::core::error::Result;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, Row};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SymbolRow {
    pub project: String,
    pub file_path: String,
    pub name: String,
    pub kind: String,
    pub is_exported: bool,
    pub fingerprint: Option<String>,
    pub signature: Option<String>,
    pub detail_json: Option<String>,
    pub span_start_line: i64,
    pub span_start_col: i64,
    pub span_end_line: i64,
    pub span_end_col: i64,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolQuery {
    pub name: Option<String>,
    pub project: Option<String>,
    pub file: Option<String>,
    pub kind: Option<String>,
    pub exported_only: bool,
    pub limit: Option<usize>,
}

fn from_row(row: &Row) -> rusqlite::Result<SymbolRow> {
    Ok(SymbolRow {
        project: row.get("project")?,
        file_path: row.get("file_path")?,
        name: row.get("name")?,
        kind: row.get("kind")?,
        is_exported: row.get::<_, i64>("is_exported")? != 0,
        fingerprint: row.get("fingerprint")?,
        signature: row.get("signature")?,
        detail_json: row.get("detail_json")?,
        span_start_line: row.get("span_start_line")?,
        span_start_col: row.get("span_start_col")?,
        span_end_line: row.get("span_end_line")?,
        span_end_col: row.get("span_end_col")?,
        content_hash: row.get("content_hash")?,
    })
}

/// Replace every symbol row for a file with the given set, atomically with
/// respect to the enclosing transaction.
pub fn replace_file_symbols(
    conn: &Connection,
    project: &str,
    file_path: &str,
    content_hash: &str,
    rows: &[SymbolRow],
) -> Result<()> {
    conn.execute(
        "DELETE FROM symbols WHERE project = ?1 AND file_path = ?2",
        params![project, file_path],
    )?;

    let mut stmt = conn.prepare_cached(
        "INSERT INTO symbols (project, file_path, name, kind, is_exported, fingerprint,
                              signature, detail_json, span_start_line, span_start_col,
                              span_end_line, span_end_col, content_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    for row in rows {
        stmt.execute(params![
            project,
            file_path,
            row.name,
            row.kind,
            row.is_exported as i64,
            row.fingerprint,
            row.signature,
            row.detail_json,
            row.span_start_line,
            row.span_start_col,
            row.span_end_line,
            row.span_end_col,
            content_hash,
        ])?;
    }
    Ok(())
}

pub fn get_file_symbols(conn: &Connection, project: &str, file_path: &str) -> Result<Vec<SymbolRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM symbols WHERE project = ?1 AND file_path = ?2
         ORDER BY span_start_line, span_start_col, name",
    )?;
    let rows = stmt
        .query_map(params![project, file_path], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get_by_fingerprint(
    conn: &Connection,
    project: &str,
    fingerprint: &str,
) -> Result<Vec<SymbolRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM symbols WHERE project = ?1 AND fingerprint = ?2",
    )?;
    let rows = stmt
        .query_map(params![project, fingerprint], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get_symbol(
    conn: &Connection,
    project: &str,
    file_path: &str,
    name: &str,
) -> Result<Option<SymbolRow>> {
    use rusqlite::OptionalExtension;
    let row = conn
        .query_row(
            "SELECT * FROM symbols WHERE project = ?1 AND file_path = ?2 AND name = ?3",
            params![project, file_path, name],
            from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn delete_file_symbols(conn: &Connection, project: &str, file_path: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM symbols WHERE project = ?1 AND file_path = ?2",
        params![project, file_path],
    )?;
    Ok(())
}

pub fn count_symbols(conn: &Connection, project: Option<&str>) -> Result<i64> {
    let count = match project {
        Some(project) => conn.query_row(
            "SELECT COUNT(*) FROM symbols WHERE project = ?1",
            params![project],
            |r| r.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM symbols", [], |r| r.get(0))?,
    };
    Ok(count)
}

/// Predicate + full-text search. A `name` filter goes through the FTS index
/// (prefix match); inputs FTS5 cannot parse — qualified names, punctuation —
/// fail the MATCH and fall back to a LIKE scan.
pub fn search_symbols(conn: &Connection, query: &SymbolQuery) -> Result<Vec<SymbolRow>> {
    match fts_match_string(query.name.as_deref()) {
        Some(fts) => {
            let fts_result = run_search(conn, query, Some(SearchName::Fts(&fts)));
            match fts_result {
                Ok(rows) => Ok(rows),
                // FTS rejected the expression; degrade to LIKE
                Err(_) => run_search(
                    conn,
                    query,
                    query.name.as_deref().map(SearchName::Like),
                ),
            }
        }
        None => run_search(conn, query, query.name.as_deref().map(SearchName::Like)),
    }
}

enum SearchName<'a> {
    Fts(&'a str),
    Like(&'a str),
}

fn run_search(
    conn: &Connection,
    query: &SymbolQuery,
    name: Option<SearchName>,
) -> Result<Vec<SymbolRow>> {
    let mut sql = String::from("SELECT s.* FROM symbols s");
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    match name {
        Some(SearchName::Fts(fts)) => {
            sql.push_str(" JOIN symbols_fts ON symbols_fts.rowid = s.id");
            clauses.push("symbols_fts MATCH ?");
            params.push(Box::new(fts.to_string()));
        }
        Some(SearchName::Like(text)) => {
            clauses.push("s.name LIKE '%' || ? || '%'");
            params.push(Box::new(text.to_string()));
        }
        None => {}
    }
    if let Some(project) = &query.project {
        clauses.push("s.project = ?");
        params.push(Box::new(project.clone()));
    }
    if let Some(file) = &query.file {
        clauses.push("s.file_path = ?");
        params.push(Box::new(file.clone()));
    }
    if let Some(kind) = &query.kind {
        clauses.push("s.kind = ?");
        params.push(Box::new(kind.clone()));
    }
    if query.exported_only {
        clauses.push("s.is_exported = 1");
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY s.project, s.file_path, s.span_start_line, s.name");
    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        params.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())), from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Bare prefix query for the FTS index; `None` when the input is blank.
/// Quote and star characters are stripped so they cannot change the query
/// shape; everything else is left for FTS5 to accept or reject.
fn fts_match_string(name: Option<&str>) -> Option<String> {
    let cleaned: String = name?
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '*'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    Some(format!("{}*", cleaned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::files::{self, FileRow};
    use crate::store::Store;

    fn seed(store: &Store) {
        files::upsert_file(
            store.conn(),
            &FileRow {
                project: "app".into(),
                file_path: "src/a.ts".into(),
                mtime_ms: 0,
                size: 1,
                content_hash: "h".into(),
                updated_at: "t".into(),
                line_count: Some(1),
            },
        )
        .unwrap();

        let rows = vec![
            symbol("formatName", "function", true, Some("params:1|async:0")),
            symbol("FormatOptions", "interface", true, None),
            symbol("FormatOptions.parse", "method", true, Some("params:1|async:0")),
            symbol("internalHelper", "function", false, Some("params:0|async:0")),
        ];
        replace_file_symbols(store.conn(), "app", "src/a.ts", "h", &rows).unwrap();
    }

    fn symbol(name: &str, kind: &str, exported: bool, signature: Option<&str>) -> SymbolRow {
        SymbolRow {
            project: "app".into(),
            file_path: "src/a.ts".into(),
            name: name.into(),
            kind: kind.into(),
            is_exported: exported,
            fingerprint: Some(crate::core::paths::hash_string(name)),
            signature: signature.map(String::from),
            detail_json: None,
            span_start_line: 1,
            span_start_col: 0,
            span_end_line: 1,
            span_end_col: 10,
            content_hash: None,
        }
    }

    #[test]
    fn test_replace_is_wholesale() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);
        assert_eq!(count_symbols(store.conn(), Some("app")).unwrap(), 4);

        let rows = vec![symbol("only", "variable", false, None)];
        replace_file_symbols(store.conn(), "app", "src/a.ts", "h2", &rows).unwrap();
        let fetched = get_file_symbols(store.conn(), "app", "src/a.ts").unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].name, "only");
        assert_eq!(fetched[0].content_hash.as_deref(), Some("h2"));
    }

    #[test]
    fn test_fts_prefix_search() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);

        let results = search_symbols(
            store.conn(),
            &SymbolQuery {
                name: Some("format".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"formatName"));
        assert!(names.contains(&"FormatOptions"));
        assert!(!names.contains(&"internalHelper"));
    }

    #[test]
    fn test_predicate_filters() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);

        let results = search_symbols(
            store.conn(),
            &SymbolQuery {
                project: Some("app".into()),
                kind: Some("function".into()),
                exported_only: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "formatName");
    }

    #[test]
    fn test_fingerprint_lookup() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);
        let fp = crate::core::paths::hash_string("formatName");
        let rows = get_by_fingerprint(store.conn(), "app", &fp).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "formatName");
    }

    #[test]
    fn test_qualified_name_match_falls_back_to_like() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);

        // "FormatOptions.parse*" is not valid FTS5 syntax (bare "." token);
        // the MATCH fails and the LIKE scan recovers the flattened member
        let results = search_symbols(
            store.conn(),
            &SymbolQuery {
                name: Some("FormatOptions.parse".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "FormatOptions.parse");
    }

    #[test]
    fn test_search_with_odd_characters_falls_back() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);

        // Survives sanitization, fails the FTS parse, matches nothing via LIKE
        let results = search_symbols(
            store.conn(),
            &SymbolQuery {
                name: Some("(((".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(results.is_empty());

        // Stripped to nothing: skips FTS entirely, LIKE scans the raw text
        let results = search_symbols(
            store.conn(),
            &SymbolQuery {
                name: Some("***".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_limit() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);
        let results = search_symbols(
            store.conn(),
            &SymbolQuery {
                limit: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(results.len(), 2);
    }
}
