//! Upstream HTTP adapters.

pub mod openai_compat;
pub mod types;
