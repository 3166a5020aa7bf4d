//! Storage abstraction for strata.
//!
//! Backend crates (strata-store-sqlite, strata-store-postgres) implement the
//! [`PitStore`] trait so the versioning engine doesn't depend on any specific
//! database engine or schema details.

use thiserror::Error;

mod store;
pub mod types;

pub use store::PitStore;
#[cfg(feature = "test-support")]
pub use store::MockPitStore;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(StoreError::NotFound.to_string(), "not found");
        assert_eq!(
            StoreError::Backend("disk full".into()).to_string(),
            "backend error: disk full"
        );
    }
}
