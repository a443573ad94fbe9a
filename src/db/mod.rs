//! SQLite bootstrap: sqlite-vec registration, connection setup, schema.

pub mod schema;

use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

use crate::error::{QaError, Result};

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the index database at the given path with sqlite-vec
/// loaded and the schema initialized.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)?;

    // WAL lets readers proceed while an ingestion transaction is open
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn)?;

    let version = schema::get_schema_version(&conn)?;
    if version > schema::SCHEMA_VERSION {
        return Err(QaError::InvalidInput(format!(
            "database {} has schema version {version}, newer than supported version {}",
            path.display(),
            schema::SCHEMA_VERSION
        )));
    }

    tracing::info!(path = %path.display(), schema_version = version, "database initialized");
    Ok(conn)
}

/// Open an in-memory database with the full schema. Used by tests and tooling.
pub fn open_memory_database() -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn)?;
    Ok(conn)
}
