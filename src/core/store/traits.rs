//! Ledger backend trait definition.

use super::{FetchKey, StoreStats};
use crate::error::StoreError;

/// Trait for fetch-ledger backends
pub trait FetchStore: Send + Sync {
    /// Whether this identity was fetched before.
    fn contains(&self, key: &FetchKey) -> Result<bool, StoreError>;

    /// Record an identity as fetched.
    ///
    /// Recording an identity that is already present is a no-op, not
    /// an error.
    fn record(&self, key: &FetchKey) -> Result<(), StoreError>;

    /// Forget every recorded identity.
    ///
    /// The next run re-downloads everything.
    fn clear(&self) -> Result<(), StoreError>;

    /// Ledger statistics
    fn stats(&self) -> Result<StoreStats, StoreError>;
}
