//! ContentHasher trait for computing cache fingerprints.
//!
//! Defined in answerpool-core so the cache can fingerprint questions without
//! coupling to a specific digest. The `Sha256ContentHasher` adapter lives in
//! answerpool-infra.

/// Abstraction over content hashing.
///
/// Implementations must return a full-width hex digest (never truncated) and
/// must be deterministic across processes so the shared tier stays coherent.
pub trait ContentHasher: Send + Sync {
    /// Compute a hex-encoded hash of the given content.
    fn compute_hash(&self, content: &str) -> String;
}
