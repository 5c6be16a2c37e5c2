pub mod deliver;
pub mod list;
pub mod notify;
pub mod sweep;
