//! Storage layer
//!
//! Versioned SQLite store for reconciled datasets.
//!
//! ## Write model
//!
//! - One writer session per store file
//! - Every write call is one transaction; completed batches stay
//!   committed even if a later batch fails

pub mod database;
pub mod error;
pub mod schema;

pub use database::{Database, StoreStats};
pub use error::{StorageError, StorageResult};
pub use schema::SCHEMA_VERSION;
