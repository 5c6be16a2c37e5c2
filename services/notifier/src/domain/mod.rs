pub mod repository;
pub mod severity;
pub mod template;
pub mod types;
