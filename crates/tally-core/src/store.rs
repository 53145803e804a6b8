//! Item store
//!
//! Owns the batched random inserts, the bulk clear, and the reactive
//! count subscriptions the presentation layer renders.

use rusqlite::{Connection, OptionalExtension};

use tally_storage::{Database, Subscription, ITEMS_TABLE};

use crate::{batch, ident, Result};

const INSERT_ITEM: &str = "INSERT INTO test (groupId, name) VALUES (?1, ?2)";
const COUNT_ITEMS: &str = "SELECT COUNT(*) AS count FROM test";
const COUNT_GROUPS: &str = "SELECT COUNT(DISTINCT groupId) AS count FROM test";

/// Inclusive range for the total item count of one randomized insert.
const ITEM_RANGE: (usize, usize) = (8, 16);
/// Inclusive range for the sub-batch size.
const BATCH_RANGE: (usize, usize) = (3, 6);

pub struct ItemStore {
    db: Database,
}

impl ItemStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a randomized batch of placeholder items.
    ///
    /// Picks a total count in `[8, 16]` and a sub-batch size in
    /// `[3, 6]`, names the items `"Item 0"` through `"Item n-1"`, and
    /// commits every sub-batch under its own fresh `groupId` inside one
    /// transaction. Any failure rolls the whole call back; no partial
    /// sub-batches persist.
    pub async fn insert_random_items(&self) -> Result<()> {
        let item_count = ident::random_int(ITEM_RANGE.0, ITEM_RANGE.1);
        let batch_size = ident::random_int(BATCH_RANGE.0, BATCH_RANGE.1);

        let names: Vec<String> = (0..item_count).map(|i| format!("Item {i}")).collect();
        let sizes = batch::partition(item_count, batch_size);

        self.db.transaction(&[ITEMS_TABLE], |conn| {
            let mut stmt = conn.prepare(INSERT_ITEM)?;
            let mut names = names.iter();
            for size in &sizes {
                let group_id = ident::new_id();
                for name in names.by_ref().take(*size) {
                    stmt.execute(rusqlite::params![group_id, name])?;
                }
            }
            Ok(())
        })?;

        tracing::info!(
            items = item_count,
            batch_size,
            groups = sizes.len(),
            "Inserted random items"
        );

        Ok(())
    }

    /// Delete every item in one transaction.
    pub async fn clear_all_items(&self) -> Result<()> {
        self.db.transaction(&[ITEMS_TABLE], |conn| {
            conn.execute("DELETE FROM test", [])?;
            Ok(())
        })?;

        tracing::info!("Cleared all items");
        Ok(())
    }

    /// Subscribe to the live item count. Delivers the current count
    /// immediately, then again after every commit touching the item
    /// table.
    pub fn watch_item_count<C>(&self, callback: C) -> Subscription
    where
        C: Fn(i64) + Send + Sync + 'static,
    {
        self.db
            .watch(&[ITEMS_TABLE], |conn| count_query(conn, COUNT_ITEMS), callback)
    }

    /// Subscribe to the live count of distinct insert groups.
    pub fn watch_group_count<C>(&self, callback: C) -> Subscription
    where
        C: Fn(i64) + Send + Sync + 'static,
    {
        self.db
            .watch(&[ITEMS_TABLE], |conn| count_query(conn, COUNT_GROUPS), callback)
    }
}

impl Clone for ItemStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

/// Run a single-row aggregate, coalescing a missing row or null
/// aggregate to zero.
fn count_query(conn: &Connection, sql: &str) -> tally_storage::Result<i64> {
    let count: Option<Option<i64>> = conn.query_row(sql, [], |row| row.get(0)).optional()?;
    Ok(count.flatten().unwrap_or(0))
}
