//! # Stele SQLite
//!
//! The SQLite reference provider: a [`stele_dao::EntityManager`]
//! implementation over a SQLx connection pool, plus the pool and
//! configuration plumbing around it.
//!
//! The entity manager keeps a small persistence context (pending writes
//! and managed identities). Reads flush pending writes first, so a saved
//! entity is visible to an immediately following lookup without an
//! explicit flush from the caller.

pub mod config;
pub mod manager;
pub mod pool;
pub mod service;

pub use config::*;
pub use manager::*;
pub use pool::*;
pub use service::*;
