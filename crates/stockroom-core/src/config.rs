//! Helpers for reading service configuration from environment variables.
//!
//! Services build their `*Config::from_env()` from these; empty values count as unset.

use std::str::FromStr;
use std::time::Duration;

/// Read a required variable.
///
/// # Panics
///
/// Panics with the variable name if it is missing or empty.
pub fn required(name: &str) -> String {
    optional(name).unwrap_or_else(|| panic!("{name} must be set"))
}

/// Read an optional variable; empty strings are treated as unset.
pub fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a variable, falling back to `default` when unset or unparsable.
pub fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    optional(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a whole number of seconds as a `Duration`.
pub fn secs_or(name: &str, default_secs: u64) -> Duration {
    Duration::from_secs(parsed_or(name, default_secs))
}
