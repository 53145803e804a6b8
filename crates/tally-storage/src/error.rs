//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Schema DDL failed at startup. Fatal: the store cannot operate
    /// without its table.
    #[error("Schema initialization failed: {0}")]
    Schema(#[source] rusqlite::Error),

    /// A write transaction failed and was rolled back. Nothing from the
    /// failed transaction persists.
    #[error("Transaction failed: {0}")]
    Transaction(#[source] rusqlite::Error),

    /// A read or reactive query failed.
    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),
}
