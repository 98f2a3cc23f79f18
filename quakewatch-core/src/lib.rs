#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod collaborators;
pub mod config;
pub mod dispatch;
pub mod entities;
pub mod framework;
pub mod geo;
pub mod processors;

#[cfg(test)]
pub(crate) mod testing;
