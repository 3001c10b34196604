//! # Stele Core
//!
//! Core types, traits, and error definitions for Stele, a thin
//! data-access-object layer over an entity-manager-style persistence
//! provider. This crate carries the vocabulary shared by the Dao facade
//! and the provider crates: the error taxonomy, the opaque positional
//! parameter [`Value`], the [`Record`] row image, and the [`Entity`]
//! metadata registration trait.

pub mod entity;
pub mod error;
pub mod record;
pub mod result;
pub mod value;

pub use entity::*;
pub use error::*;
pub use record::*;
pub use result::*;
pub use value::*;

// Re-export shaku for dependency injection
pub use shaku::Interface;
