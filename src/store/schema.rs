//! Store layout
//!
//! Applied as one batch inside the opening transaction. `symbols_fts` is an
//! external-content FTS5 table kept in sync with `symbols.name` by triggers.

pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    project      TEXT NOT NULL,
    file_path    TEXT NOT NULL,
    mtime_ms     INTEGER NOT NULL,
    size         INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    line_count   INTEGER,
    PRIMARY KEY (project, file_path)
);

CREATE TABLE IF NOT EXISTS symbols (
    id              INTEGER PRIMARY KEY,
    project         TEXT NOT NULL,
    file_path       TEXT NOT NULL,
    name            TEXT NOT NULL,
    kind            TEXT NOT NULL,
    is_exported     INTEGER NOT NULL DEFAULT 0,
    fingerprint     TEXT,
    signature       TEXT,
    detail_json     TEXT,
    span_start_line INTEGER NOT NULL DEFAULT 0,
    span_start_col  INTEGER NOT NULL DEFAULT 0,
    span_end_line   INTEGER NOT NULL DEFAULT 0,
    span_end_col    INTEGER NOT NULL DEFAULT 0,
    content_hash    TEXT,
    FOREIGN KEY (project, file_path) REFERENCES files (project, file_path) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols (project, file_path);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols (name);
CREATE INDEX IF NOT EXISTS idx_symbols_fingerprint ON symbols (project, fingerprint);

CREATE TABLE IF NOT EXISTS relations (
    id              INTEGER PRIMARY KEY,
    project         TEXT NOT NULL,
    rel_type        TEXT NOT NULL,
    src_file_path   TEXT NOT NULL,
    src_symbol_name TEXT,
    dst_project     TEXT NOT NULL,
    dst_file_path   TEXT NOT NULL,
    dst_symbol_name TEXT,
    meta_json       TEXT,
    FOREIGN KEY (dst_project, dst_file_path) REFERENCES files (project, file_path) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_relations_src ON relations (project, src_file_path);
CREATE INDEX IF NOT EXISTS idx_relations_dst ON relations (dst_project, dst_file_path);
CREATE INDEX IF NOT EXISTS idx_relations_type ON relations (project, rel_type);

CREATE TABLE IF NOT EXISTS watcher_owner (
    id           INTEGER PRIMARY KEY CHECK (id = 1),
    pid          INTEGER NOT NULL,
    heartbeat_at TEXT NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS symbols_fts USING fts5(
    name,
    content='symbols',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS symbols_fts_insert AFTER INSERT ON symbols BEGIN
    INSERT INTO symbols_fts (rowid, name) VALUES (new.id, new.name);
END;

CREATE TRIGGER IF NOT EXISTS symbols_fts_delete AFTER DELETE ON symbols BEGIN
    INSERT INTO symbols_fts (symbols_fts, rowid, name) VALUES ('delete', old.id, old.name);
END;

CREATE TRIGGER IF NOT EXISTS symbols_fts_update AFTER UPDATE OF name ON symbols BEGIN
    INSERT INTO symbols_fts (symbols_fts, rowid, name) VALUES ('delete', old.id, old.name);
    INSERT INTO symbols_fts (rowid, name) VALUES (new.id, new.name);
END;
"#;
