//! Upstream completion port.
//!
//! - `UpstreamClient`: RPITIT trait for concrete HTTP adapters
//! - `BoxUpstreamClient`: object-safe wrapper for dynamic dispatch

pub mod box_client;
pub mod client;
