//! rusty-blog/crates/storage-adapters/src/lib.rs
//!
//! Document-store implementations of the repository ports.
//! `memory` is always compiled; `postgres` sits behind the `db-postgres` feature.

pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "db-postgres")]
pub use postgres::PostgresStore;
