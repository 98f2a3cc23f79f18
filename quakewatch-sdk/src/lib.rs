//! Shared wire types for quakewatch.
//!
//! The HTTP clients for the upstream feed and the outbound channels are
//! gated behind the `client` feature.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
