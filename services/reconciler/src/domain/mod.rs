pub mod diff;
pub mod repository;
pub mod types;
