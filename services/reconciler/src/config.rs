use std::path::PathBuf;
use std::time::Duration;

use stockroom_core::config::{optional, parsed_or, required};

/// Reconciler configuration loaded from environment variables.
#[derive(Debug)]
pub struct ReconcilerConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// TCP port for the HTTP server (default 3121). Env var: `RECONCILER_PORT`.
    pub reconciler_port: u16,
    /// Default expected-inventory file. Env var: `EXPECTED_INVENTORY_PATH`.
    pub expected_inventory_path: PathBuf,
    /// Period of scheduled runs under `serve`; `None` disables them.
    pub run_interval: Option<Duration>,
}

impl ReconcilerConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: required("DATABASE_URL"),
            reconciler_port: parsed_or("RECONCILER_PORT", 3121),
            expected_inventory_path: optional("EXPECTED_INVENTORY_PATH")
                .unwrap_or_else(|| "data/expected_inventory.csv".to_owned())
                .into(),
            run_interval: optional("RECON_INTERVAL_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}
