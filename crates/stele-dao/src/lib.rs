//! # Stele Dao
//!
//! The generic data-access facade and query builder.
//!
//! ```text
//! Caller
//!   ↓  Dao<M>                      (CRUD + expression queries, one mapped type)
//!   ↓  Query<M> / QueryDescriptor  (kind, filter expression, positional params)
//!   ↓  Arc<dyn EntityManager>      (provider seam: persist/merge/remove/refresh,
//!   ↓                               flush/clear, descriptor execution)
//! Provider crate (e.g. stele-sqlite)
//! ```
//!
//! A `Dao<M>` resolves its persistence-service binding lazily from a
//! [`ServiceLocator`] the first time it is used; the binding is cached for
//! the Dao's lifetime and resolution is race-safe. Everything else in this
//! crate is stateless translation.

pub mod dao;
pub mod expr;
pub mod manager;
pub mod query;
pub mod service;

pub use dao::*;
pub use manager::*;
pub use query::*;
pub use service::*;
