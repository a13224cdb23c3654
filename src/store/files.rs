//! File rows: the FK parent of every symbol and relation.

use crate::core::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub project: String,
    pub file_path: String,
    pub mtime_ms: i64,
    pub size: i64,
    pub content_hash: String,
    pub updated_at: String,
    pub line_count: Option<i64>,
}

fn from_row(row: &Row) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        project: row.get("project")?,
        file_path: row.get("file_path")?,
        mtime_ms: row.get("mtime_ms")?,
        size: row.get("size")?,
        content_hash: row.get("content_hash")?,
        updated_at: row.get("updated_at")?,
        line_count: row.get("line_count")?,
    })
}

pub fn upsert_file(conn: &Connection, file: &FileRow) -> Result<()> {
    conn.execute(
        "INSERT INTO files (project, file_path, mtime_ms, size, content_hash, updated_at, line_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (project, file_path) DO UPDATE SET
             mtime_ms = excluded.mtime_ms,
             size = excluded.size,
             content_hash = excluded.content_hash,
             updated_at = excluded.updated_at,
             line_count = excluded.line_count",
        params![
            file.project,
            file.file_path,
            file.mtime_ms,
            file.size,
            file.content_hash,
            file.updated_at,
            file.line_count
        ],
    )?;
    Ok(())
}

pub fn get_file(conn: &Connection, project: &str, file_path: &str) -> Result<Option<FileRow>> {
    let row = conn
        .query_row(
            "SELECT * FROM files WHERE project = ?1 AND file_path = ?2",
            params![project, file_path],
            from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn get_all_files(conn: &Connection) -> Result<Vec<FileRow>> {
    let mut stmt = conn.prepare("SELECT * FROM files ORDER BY project, file_path")?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Snapshot of every indexed file path (root-relative), used by the
/// known-files resolver. Captures read-your-own-writes inside transactions.
pub fn get_files_map(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT file_path FROM files")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(rows)
}

/// Delete a file row; symbol rows and incoming relations cascade.
pub fn delete_file(conn: &Connection, project: &str, file_path: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM files WHERE project = ?1 AND file_path = ?2",
        params![project, file_path],
    )?;
    Ok(())
}

pub fn count_files(conn: &Connection, project: Option<&str>) -> Result<i64> {
    let count = match project {
        Some(project) => conn.query_row(
            "SELECT COUNT(*) FROM files WHERE project = ?1",
            params![project],
            |r| r.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?,
    };
    Ok(count)
}

pub fn list_projects(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT project FROM files ORDER BY project")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    pub(crate) fn sample(project: &str, path: &str) -> FileRow {
        FileRow {
            project: project.to_string(),
            file_path: path.to_string(),
            mtime_ms: 1_700_000_000_000,
            size: 120,
            content_hash: "abcd1234abcd1234".to_string(),
            updated_at: "2026-08-01T00:00:00Z".to_string(),
            line_count: Some(10),
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let store = Store::open_in_memory().unwrap();
        let mut file = sample("app", "src/a.ts");
        upsert_file(store.conn(), &file).unwrap();

        file.size = 240;
        file.content_hash = "ffff0000ffff0000".to_string();
        upsert_file(store.conn(), &file).unwrap();

        let fetched = get_file(store.conn(), "app", "src/a.ts").unwrap().unwrap();
        assert_eq!(fetched.size, 240);
        assert_eq!(fetched.content_hash, "ffff0000ffff0000");
        assert_eq!(count_files(store.conn(), None).unwrap(), 1);
    }

    #[test]
    fn test_files_map_and_projects() {
        let store = Store::open_in_memory().unwrap();
        upsert_file(store.conn(), &sample("app", "src/a.ts")).unwrap();
        upsert_file(store.conn(), &sample("lib", "packages/lib/b.ts")).unwrap();

        let map = get_files_map(store.conn()).unwrap();
        assert!(map.contains("src/a.ts"));
        assert!(map.contains("packages/lib/b.ts"));

        assert_eq!(list_projects(store.conn()).unwrap(), vec!["app", "lib"]);
    }

    #[test]
    fn test_delete_cascades_symbols() {
        let store = Store::open_in_memory().unwrap();
        upsert_file(store.conn(), &sample("app", "src/a.ts")).unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO symbols (project, file_path, name, kind) VALUES ('app', 'src/a.ts', 'x', 'variable')",
                [],
            )
            .unwrap();

        delete_file(store.conn(), "app", "src/a.ts").unwrap();
        let count: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM symbols", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
