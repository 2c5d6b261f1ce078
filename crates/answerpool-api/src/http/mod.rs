//! HTTP/REST API layer for answerpool.
//!
//! Axum router at `/api/v1/` with the envelope response format. No
//! authentication: the pool is meant to sit behind the caller's own edge.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
