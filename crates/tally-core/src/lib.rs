//! Tally Core
//!
//! Batched transactional writes over the storage layer, plus the typed
//! reactive count subscriptions consumed by the presentation layer.

mod batch;
mod error;
mod ident;
mod store;

pub use error::CoreError;
pub use store::ItemStore;

// Re-export storage components
pub use tally_storage::{Database, StorageError, Subscription};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
