//! Tally Storage Layer
//!
//! SQLite-based persistence for the item store. All writes are
//! transactional; committed writes feed the reactive query
//! subscriptions in [`reactive`].

mod database;
mod error;
mod reactive;
mod schema;

pub use database::Database;
pub use error::StorageError;
pub use reactive::Subscription;
pub use schema::ITEMS_TABLE;

pub type Result<T> = std::result::Result<T, StorageError>;
