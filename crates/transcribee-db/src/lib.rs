//! Persistence (component C2): schema, connection pool, repositories, and
//! the blob store abstraction.
//!
//! Every repository takes an `&mut PgConnection` (usually borrowed from an
//! open `Transaction`) rather than a pool, so callers control exactly what
//! runs inside one ACID transaction — the claim/keepalive/complete/fail
//! paths in `transcribee-tasks` depend on that.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod blob;
pub mod error;
pub mod models;
pub mod pool;
pub mod repo;

pub use error::DbError;
pub use pool::{connect, run_migrations, DbPool};
