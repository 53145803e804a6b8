//! Idempotent schema setup
//!
//! Single table holding batch-inserted items. Create-if-absent is the
//! only migration policy.

use rusqlite::Connection;

use crate::{Result, StorageError};

/// Name of the item table, used when declaring watched tables.
pub const ITEMS_TABLE: &str = "test";

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS test (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            groupId TEXT NOT NULL,
            name TEXT NOT NULL
        );
    "#,
    )
    .map_err(StorageError::Schema)?;

    tracing::debug!("Item table ready");
    Ok(())
}
