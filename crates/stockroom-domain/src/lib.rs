//! Domain types shared across all Stockroom services.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; never in `infra/` or `handlers/`.

pub mod asset;
pub mod event;
pub mod id;
pub mod lenient;
pub mod pagination;
pub mod warehouse;
