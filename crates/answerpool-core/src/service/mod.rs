//! Service-level ports shared across the pool.

pub mod hash;
