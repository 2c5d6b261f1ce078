//! HTTP request handlers for the REST API.

pub mod answer;
pub mod cache;
pub mod provider;
