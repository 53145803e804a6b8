//! Reactive query subscriptions
//!
//! A subscription pairs a read query with the set of tables it depends
//! on. Whenever a transaction commits against one of those tables the
//! registry re-runs the query and hands the fresh result to the
//! subscriber's callback. One initial result is delivered at
//! registration, before any mutation. Granularity is per-table: any
//! committed write to a watched table triggers re-evaluation, whether
//! or not the result changed.

use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::database::Database;
use crate::Result;

type DeliverFn = Arc<dyn Fn(&Database) + Send + Sync>;

struct SubscriptionRecord {
    id: u64,
    deliver: DeliverFn,
    active: Arc<AtomicBool>,
}

type TableSubscriptions = HashMap<String, Vec<Arc<SubscriptionRecord>>>;

pub(crate) struct QueryRegistry {
    subscriptions: Arc<Mutex<TableSubscriptions>>,
    next_id: Arc<AtomicU64>,
}

impl QueryRegistry {
    pub(crate) fn new() -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn watch<T, Q, C>(
        &self,
        db: &Database,
        tables: &[&str],
        query: Q,
        callback: C,
    ) -> Subscription
    where
        Q: Fn(&Connection) -> Result<T> + Send + Sync + 'static,
        C: Fn(T) + Send + Sync + 'static,
    {
        let deliver: DeliverFn = Arc::new(move |db: &Database| {
            match db.with_connection(&query) {
                Ok(value) => callback(value),
                // The subscription stays registered for the next mutation.
                Err(e) => tracing::warn!(error = %e, "Reactive query failed"),
            }
        });

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(SubscriptionRecord {
            id,
            deliver: Arc::clone(&deliver),
            active: Arc::new(AtomicBool::new(true)),
        });

        {
            let mut subs = self.subscriptions.lock();
            for table in tables {
                subs.entry((*table).to_string())
                    .or_default()
                    .push(Arc::clone(&record));
            }
        }

        // Initial delivery, before any mutation fires.
        deliver(db);

        Subscription {
            id,
            active: Arc::clone(&record.active),
            subscriptions: Arc::clone(&self.subscriptions),
        }
    }

    /// Re-evaluate every active subscription watching one of `touched`.
    ///
    /// Deliveries run on a spawned task so the committing caller never
    /// waits on subscriber callbacks. Each subscription is delivered at
    /// most once per commit even if it watches several of the touched
    /// tables.
    pub(crate) fn dispatch(&self, db: &Database, touched: &[&str]) {
        let matched: Vec<Arc<SubscriptionRecord>> = {
            let subs = self.subscriptions.lock();
            let mut seen = Vec::new();
            let mut matched = Vec::new();
            for table in touched {
                if let Some(records) = subs.get(*table) {
                    for record in records {
                        if record.active.load(Ordering::Acquire) && !seen.contains(&record.id) {
                            seen.push(record.id);
                            matched.push(Arc::clone(record));
                        }
                    }
                }
            }
            matched
        };

        if matched.is_empty() {
            return;
        }

        let db = db.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    for record in matched {
                        // Cancelled between commit and delivery: skip.
                        if record.active.load(Ordering::Acquire) {
                            (record.deliver)(&db);
                        }
                    }
                });
            }
            // No runtime available: deliver on the caller's thread.
            Err(_) => {
                for record in matched {
                    if record.active.load(Ordering::Acquire) {
                        (record.deliver)(&db);
                    }
                }
            }
        }
    }
}

impl Clone for QueryRegistry {
    fn clone(&self) -> Self {
        Self {
            subscriptions: Arc::clone(&self.subscriptions),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

/// Handle to a registered reactive subscription.
///
/// Cancelling (or dropping) the handle unregisters the subscription; no
/// further deliveries are scheduled, though one already in flight may
/// still complete.
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<TableSubscriptions>>,
}

impl Subscription {
    pub fn cancel(&self) {
        self.active.store(false, Ordering::Release);

        let mut subs = self.subscriptions.lock();
        for records in subs.values_mut() {
            records.retain(|r| r.id != self.id);
        }
        subs.retain(|_, records| !records.is_empty());
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use std::sync::mpsc;
    use std::time::Duration;

    fn item_count(conn: &Connection) -> Result<i64> {
        Ok(conn.query_row("SELECT COUNT(*) FROM test", [], |row| row.get(0))?)
    }

    fn insert_one(db: &Database) {
        db.transaction(&["test"], |conn| {
            conn.execute(
                "INSERT INTO test (groupId, name) VALUES ('g1', 'Item 0')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_initial_delivery_before_any_write() {
        let db = Database::open_in_memory().unwrap();
        let (tx, rx) = mpsc::channel();
        let _sub = db.watch(&["test"], item_count, move |n| tx.send(n).unwrap());

        assert_eq!(rx.recv().unwrap(), 0);
    }

    #[test]
    fn test_commit_triggers_redelivery() {
        // Without a runtime, dispatch runs inline on this thread.
        let db = Database::open_in_memory().unwrap();
        let (tx, rx) = mpsc::channel();
        let _sub = db.watch(&["test"], item_count, move |n| tx.send(n).unwrap());
        assert_eq!(rx.recv().unwrap(), 0);

        insert_one(&db);
        assert_eq!(rx.recv().unwrap(), 1);

        insert_one(&db);
        assert_eq!(rx.recv().unwrap(), 2);
    }

    #[test]
    fn test_untouched_table_does_not_fire() {
        let db = Database::open_in_memory().unwrap();
        let (tx, rx) = mpsc::channel();
        let _sub = db.watch(&["other"], item_count, move |n| tx.send(n).unwrap());
        assert_eq!(rx.recv().unwrap(), 0);

        insert_one(&db);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let db = Database::open_in_memory().unwrap();
        let (tx, rx) = mpsc::channel();
        let sub = db.watch(&["test"], item_count, move |n| tx.send(n).unwrap());
        assert_eq!(rx.recv().unwrap(), 0);

        sub.cancel();
        insert_one(&db);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_unregisters() {
        let db = Database::open_in_memory().unwrap();
        let (tx, rx) = mpsc::channel();
        let sub = db.watch(&["test"], item_count, move |n| tx.send(n).unwrap());
        assert_eq!(rx.recv().unwrap(), 0);

        drop(sub);
        insert_one(&db);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rolled_back_transaction_does_not_notify() {
        let db = Database::open_in_memory().unwrap();
        let (tx, rx) = mpsc::channel();
        let _sub = db.watch(&["test"], item_count, move |n| tx.send(n).unwrap());
        assert_eq!(rx.recv().unwrap(), 0);

        let result = db.transaction(&["test"], |conn| {
            conn.execute(
                "INSERT INTO test (groupId, name) VALUES ('g1', 'Item 0')",
                [],
            )?;
            conn.execute("INSERT INTO test (groupId, name) VALUES ('g1', NULL)", [])?;
            Ok(())
        });

        assert!(result.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failing_query_keeps_subscription_active() {
        let db = Database::open_in_memory().unwrap();
        let (tx, rx) = mpsc::channel();
        let flaky = |conn: &Connection| -> Result<i64> {
            let count = item_count(conn)?;
            if count == 1 {
                // Force a query error for exactly one delivery.
                let broken: i64 = conn.query_row("SELECT missing FROM test", [], |row| row.get(0))?;
                Ok(broken)
            } else {
                Ok(count)
            }
        };
        let _sub = db.watch(&["test"], flaky, move |n| tx.send(n).unwrap());
        assert_eq!(rx.recv().unwrap(), 0);

        insert_one(&db);
        // Delivery at count 1 failed and was logged, not fatal.
        assert!(rx.try_recv().is_err());

        insert_one(&db);
        assert_eq!(rx.recv().unwrap(), 2);
    }

    #[test]
    fn test_independent_subscriptions_each_notified() {
        let db = Database::open_in_memory().unwrap();
        let (tx_a, rx_a) = mpsc::channel();
        let (tx_b, rx_b) = mpsc::channel();
        let _a = db.watch(&["test"], item_count, move |n| tx_a.send(n).unwrap());
        let _b = db.watch(&["test"], item_count, move |n| tx_b.send(n).unwrap());
        assert_eq!(rx_a.recv().unwrap(), 0);
        assert_eq!(rx_b.recv().unwrap(), 0);

        insert_one(&db);
        assert_eq!(rx_a.recv().unwrap(), 1);
        assert_eq!(rx_b.recv().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_does_not_block_committer() {
        let db = Database::open_in_memory().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = db.watch(&["test"], item_count, move |n| {
            let _ = tx.send(n);
        });
        assert_eq!(rx.recv().await, Some(0));

        // The write resolves first; delivery lands on a later turn.
        insert_one(&db);
        let updated = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(updated, Some(1));
    }
}
