//! Cryptographic adapters.

pub mod hash;
