//! Result type aliases for Stele.

use crate::SteleError;

/// A specialized `Result` type for Stele operations.
pub type SteleResult<T> = Result<T, SteleError>;
