//! Record store backends
//!
//! Persistent, subscribable storage for server records, incident records and
//! monthly history records.
//!
//! ## Design
//!
//! - **Trait-based**: [`RecordStore`] allows swapping implementations
//! - **Async**: all operations are async for compatibility with Tokio
//! - **Subscribable**: mutations publish change events on broadcast channels
//!
//! ## Backends
//!
//! - **In-Memory**: no persistence, for tests and ephemeral dashboards
//! - **SQLite** (feature `store-sqlite`): embedded database, default

pub mod backend;
pub mod error;
pub mod memory;

#[cfg(feature = "store-sqlite")]
pub mod sqlite;

pub use backend::{IncidentQuery, RecordStore, StoreEvent, StoreHealth};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteStore;
