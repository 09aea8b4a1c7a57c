//! SQLite schema for the annotation store
//!
//! Five tables, all scoped by document content hash where applicable:
//! annotations, highlights, the nickname→userid cache, the tombstones
//! for deletions of foreign annotations, and the queue of owned
//! deletions awaiting a remote delete request.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the full database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Annotations table; id is the store-local identity, uuid the
        -- cross-store one
        CREATE TABLE IF NOT EXISTS annotations (
            id INTEGER PRIMARY KEY,
            md5 TEXT NOT NULL,
            page INTEGER NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            bodyurl TEXT NOT NULL DEFAULT '',
            texttitle TEXT NOT NULL DEFAULT '',
            textcreator TEXT NOT NULL DEFAULT '',
            created REAL NOT NULL,
            modified REAL NOT NULL,
            creator TEXT NOT NULL DEFAULT '',
            annotates TEXT NOT NULL DEFAULT '',
            color TEXT NOT NULL DEFAULT '',
            local INTEGER NOT NULL DEFAULT 1,
            mimetype TEXT NOT NULL DEFAULT '',
            uuid TEXT NOT NULL DEFAULT '',
            annotationurl TEXT NOT NULL DEFAULT ''
        );

        -- Text-range highlights, value identity only
        CREATE TABLE IF NOT EXISTS highlights (
            md5 TEXT NOT NULL,
            page INTEGER NOT NULL,
            init_pos INTEGER NOT NULL,
            end_pos INTEGER NOT NULL
        );

        -- Nickname digest -> server user id cache
        CREATE TABLE IF NOT EXISTS annuserid (
            username TEXT PRIMARY KEY,
            userid TEXT NOT NULL DEFAULT ''
        );

        -- Tombstones: uuids deleted locally that must not resurrect
        CREATE TABLE IF NOT EXISTS deleted_annotations (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL
        );

        -- Owned deletions awaiting a remote delete request
        CREATE TABLE IF NOT EXISTS pending_deletes (
            uuid TEXT PRIMARY KEY
        );

        CREATE INDEX IF NOT EXISTS idx_annotations_md5 ON annotations(md5);
        CREATE INDEX IF NOT EXISTS idx_annotations_uuid ON annotations(uuid);
        CREATE INDEX IF NOT EXISTS idx_highlights_md5 ON highlights(md5);
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Re-create the auxiliary tables on an already-provisioned database
///
/// Seed databases shipped before the tombstone table existed lack it;
/// every open runs this so older databases keep working.
pub fn ensure_aux_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS deleted_annotations (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS highlights (
            md5 TEXT NOT NULL,
            page INTEGER NOT NULL,
            init_pos INTEGER NOT NULL,
            end_pos INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS annuserid (
            username TEXT PRIMARY KEY,
            userid TEXT NOT NULL DEFAULT ''
        );
        CREATE TABLE IF NOT EXISTS pending_deletes (
            uuid TEXT PRIMARY KEY
        );
        "#,
    )
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
