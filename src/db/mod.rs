// Database layer — a JSON document store on SQLite.
//
// We use rusqlite with the "bundled" feature so there's no system SQLite
// dependency. The database file lives wherever TASTEMATCH_DB_PATH points
// (defaults to ./tastematch.db).

pub mod models;
pub mod queries;
pub mod records;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use models::Collection;
pub use traits::DocumentStore;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Open (or create) the database and run migrations.
///
/// This is the main entry point, called by `tastematch init` and by any
/// command that needs database access.
pub fn initialize(db_path: &str) -> Result<Connection> {
    // Create parent directories if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    // Enable WAL mode for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing database (fails if it doesn't exist yet).
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run `tastematch init` first.",
            db_path
        );
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Pick up migrations added since the database was created
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Create the database if needed and wrap it as a shared document store.
pub fn initialize_sqlite(db_path: &str) -> Result<Arc<dyn DocumentStore>> {
    let conn = initialize(db_path)?;
    Ok(Arc::new(sqlite::SqliteStore::new(conn)))
}

/// Open an existing database as a shared document store.
pub fn open_sqlite(db_path: &str) -> Result<Arc<dyn DocumentStore>> {
    let conn = open(db_path)?;
    Ok(Arc::new(sqlite::SqliteStore::new(conn)))
}
