//! Persisted collections behind the probing pipeline
//!
//! This module provides a trait-based abstraction over the four
//! collections (`monitors`, `uptime_events`, `alerts`, `monitor_agents`).
//!
//! ## Design
//!
//! - **Trait-based**: `UptimeStore` allows swapping implementations
//! - **Async**: all operations are async for compatibility with the
//!   Tokio actors
//! - **Single-row atomic**: the pipeline's invariants are preserved with
//!   single-row inserts and updates; no cross-row transactions
//!
//! ## Implementations
//!
//! - **SQLite** (default): embedded database behind the `storage-sqlite`
//!   feature, WAL mode, sqlx migrations
//! - **In-memory**: no persistence; used by tests and database-less runs

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, UptimeStore};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use schema::{AgentRow, AgentType, AlertRow, EventRow, MonitorRow};
#[cfg(feature = "storage-sqlite")]
pub use sqlite::SqliteStore;
