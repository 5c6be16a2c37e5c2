//! Test utilities for Stockroom services.
//!
//! Snapshot/event builders and a fixture-file loader. Import from test code only.

pub mod events;
pub mod fixture;
