//! Database provisioning
//!
//! Locates or installs the versioned annotation database. The expected
//! layout is a single sqlite file under the data directory; when it is
//! absent, a bundled seed copy is installed. If neither exists the store
//! cannot initialize.

pub mod error;
pub mod schema;

use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

pub use error::{StoreError, StoreResult};

/// Open the annotation database, installing the seed copy if needed
///
/// - Database present: open it and make sure the auxiliary tables exist
///   (older seeds predate the tombstone table).
/// - Database absent, seed present: install the seed, then open.
/// - Neither: fatal `StoreError::MissingDatabase`.
pub fn provision(db_path: &Path, seed_path: Option<&Path>) -> StoreResult<Connection> {
    if !db_path.exists() {
        let seed = seed_path.filter(|p| p.exists()).ok_or_else(|| {
            StoreError::MissingDatabase {
                db_path: db_path.to_path_buf(),
            }
        })?;

        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::copy(seed, db_path).map_err(|source| StoreError::SeedInstall {
            seed: seed.to_path_buf(),
            db_path: db_path.to_path_buf(),
            source,
        })?;
        info!("Installed seed database at {:?}", db_path);
    }

    let conn = Connection::open(db_path)?;
    schema::ensure_aux_tables(&conn)?;
    debug!("Opened annotation database at {:?}", db_path);
    Ok(conn)
}

/// Create a fresh, empty database with the full schema
///
/// This is how the bundled seed is produced; tests use it in place of a
/// shipped seed file.
pub fn create_seed(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let conn = Connection::open(path)?;
    schema::init_schema(&conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_provision_missing_everything_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("anno_v1.db");

        let result = provision(&db_path, None);
        assert!(matches!(
            result,
            Err(StoreError::MissingDatabase { .. })
        ));
    }

    #[test]
    fn test_provision_installs_seed() {
        let temp_dir = TempDir::new().unwrap();
        let seed = temp_dir.path().join("seed.db");
        let db_path = temp_dir.path().join("data").join("anno_v1.db");

        create_seed(&seed).unwrap();
        let conn = provision(&db_path, Some(&seed)).unwrap();

        assert!(db_path.exists());
        assert_eq!(
            schema::get_schema_version(&conn).unwrap(),
            Some(schema::SCHEMA_VERSION)
        );
    }

    #[test]
    fn test_provision_opens_existing_without_seed() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("anno_v1.db");

        create_seed(&db_path).unwrap();
        // Second open needs no seed
        let conn = provision(&db_path, None).unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM annotations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_provision_repairs_old_seed() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("anno_v1.db");

        // An old seed without the tombstone table
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE annotations (id INTEGER PRIMARY KEY, md5 TEXT NOT NULL, \
             page INTEGER NOT NULL, title TEXT, content TEXT, bodyurl TEXT, \
             texttitle TEXT, textcreator TEXT, created REAL, modified REAL, \
             creator TEXT, annotates TEXT, color TEXT, local INTEGER, \
             mimetype TEXT, uuid TEXT, annotationurl TEXT)",
        )
        .unwrap();
        drop(conn);

        let conn = provision(&db_path, None).unwrap();
        conn.execute(
            "INSERT INTO deleted_annotations (uuid) VALUES (?1)",
            ["urn:sugaruuid:u-x-1"],
        )
        .unwrap();
    }
}
