//! Infrastructure layer for answerpool.
//!
//! Contains implementations of the ports defined in `answerpool-core`:
//! the OpenAI-compatible upstream HTTP client, the SQLite shared cache tier,
//! SHA-256 fingerprint hashing, and the TOML configuration loader.

pub mod config;
pub mod crypto;
pub mod sqlite;
pub mod upstream;
