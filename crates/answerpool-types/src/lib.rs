//! Shared domain types for answerpool.
//!
//! This crate contains the data shapes used across the provider proxy pool:
//! provider and pool configuration, answer requests, the wire-neutral
//! upstream chat types, status snapshots, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod answer;
pub mod config;
pub mod error;
pub mod status;
pub mod upstream;
