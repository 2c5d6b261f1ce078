//! SQLite storage for the shared cache tier.

pub mod pool;
pub mod response_store;
