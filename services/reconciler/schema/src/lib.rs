pub mod assets;
pub mod audit_events;
pub mod recon_reports;
