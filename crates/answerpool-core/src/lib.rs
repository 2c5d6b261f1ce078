//! Business logic and port definitions for answerpool.
//!
//! This crate owns the provider proxy pool: the registry, the per-key health
//! tracker, the two-tier response cache, the selector and the dispatch
//! orchestrator. It defines the ports (`UpstreamClient`, `SharedCacheStore`,
//! `ContentHasher`) that `answerpool-infra` implements, and depends only on
//! `answerpool-types` -- never on an HTTP client or database crate.

pub mod answer;
pub mod cache;
pub mod pool;
pub mod service;
pub mod upstream;
