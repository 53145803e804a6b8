//! Database connection and operations

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

use crate::reactive::{QueryRegistry, Subscription};
use crate::schema::create_schema;
use crate::{Result, StorageError};

pub struct Database {
    conn: Arc<Mutex<Connection>>,
    registry: QueryRegistry,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).map_err(StorageError::Schema)?;

        // WAL mode for better concurrent performance
        let _: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(StorageError::Schema)?;

        create_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            registry: QueryRegistry::new(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::Schema)?;
        create_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            registry: QueryRegistry::new(),
        })
    }

    /// Run read or autonomous statements on the shared connection.
    ///
    /// Statements issued here commit individually; writes that must be
    /// atomic belong in [`Database::transaction`].
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `work` inside a single atomic transaction.
    ///
    /// `touched` names the tables the transaction writes. After a
    /// successful commit every subscription watching one of them is
    /// re-evaluated. An error rolls the whole transaction back and
    /// nothing is dispatched.
    pub fn transaction<F, T>(&self, touched: &[&str], work: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let value = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction().map_err(StorageError::Transaction)?;
            let value = work(&tx).map_err(|e| match e {
                StorageError::Query(e) => StorageError::Transaction(e),
                other => other,
            })?;
            tx.commit().map_err(StorageError::Transaction)?;
            value
        };

        self.registry.dispatch(self, touched);
        Ok(value)
    }

    /// Register a reactive subscription: deliver the current result of
    /// `query` to `callback` now, then again after every committed
    /// transaction touching one of `tables`.
    pub fn watch<T, Q, C>(&self, tables: &[&str], query: Q, callback: C) -> Subscription
    where
        Q: Fn(&Connection) -> Result<T> + Send + Sync + 'static,
        C: Fn(T) + Send + Sync + 'static,
    {
        self.registry.watch(self, tables, query, callback)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            registry: self.registry.clone(),
        }
    }
}
