//! Status store backends
//!
//! The poller and the REST API share one [`StatusStore`] behind an `Arc`.
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database, survives restarts
//! - **In-Memory**: No persistence, for tests and throwaway runs
//!
//! ## Usage
//!
//! ```no_run
//! use server_inventory::storage::{StatusStore, sqlite::SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteStore::new("./servers.db").await?;
//!     let servers = store.list_servers().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, StatusStore};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
