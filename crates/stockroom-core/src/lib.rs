//! Ambient plumbing shared by the Stockroom services: tracing, env config, health, request ids.

pub mod config;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
