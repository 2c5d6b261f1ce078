//! Two-tier response cache.
//!
//! - `fingerprint`: request normalization and hashing
//! - `store`: `SharedCacheStore` port for the durable tier (+ boxed wrapper)
//! - `response`: the `ResponseCache` combining a moka tier with the shared tier

pub mod fingerprint;
pub mod response;
pub mod store;
