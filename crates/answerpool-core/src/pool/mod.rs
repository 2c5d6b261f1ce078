//! The provider proxy pool.
//!
//! - `registry`: configured providers with runtime `active`/`priority`
//! - `health`: per-key failure accounting and cooldowns
//! - `selector`: ordered (provider, key) candidates for one request
//! - `dispatch`: the orchestrator tying cache, selection and upstream calls
//! - `checker`: periodic background health checks

pub mod checker;
pub mod dispatch;
pub mod health;
pub mod registry;
pub mod selector;
