/// Worker configuration
///
/// Loaded from the environment (and `.env` when present):
///
/// | Variable | Default |
/// |----------|---------|
/// | `DATABASE_URL` | required |
/// | `DATABASE_MAX_CONNECTIONS` | 5 |
/// | `WORKER_POLL_INTERVAL_SECS` | 30 |
/// | `WORKER_BATCH_SIZE` | 50 |

use anyhow::{bail, Context};
use std::env;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,

    pub max_connections: u32,

    /// Pause between two ticks
    pub poll_interval_secs: u64,

    /// Upper bound on items each job handles per tick
    pub batch_size: usize,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    ///
    /// # Errors
    ///
    /// Fails when `DATABASE_URL` is missing or a number does not parse.
    /// A zero batch size or interval is rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let poll_interval_secs =
            parse_or(&lookup, "WORKER_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let batch_size = parse_or(&lookup, "WORKER_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;

        if poll_interval_secs == 0 {
            bail!("WORKER_POLL_INTERVAL_SECS must be greater than zero");
        }
        if batch_size == 0 {
            bail!("WORKER_BATCH_SIZE must be greater than zero");
        }

        Ok(WorkerConfig {
            database_url,
            max_connections,
            poll_interval_secs,
            batch_size,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/hearth")])).unwrap();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/hearth"),
            ("WORKER_POLL_INTERVAL_SECS", "5"),
            ("WORKER_BATCH_SIZE", " 10 "),
        ]))
        .unwrap();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_missing_database_url() {
        assert!(WorkerConfig::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        let zero = WorkerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/hearth"),
            ("WORKER_BATCH_SIZE", "0"),
        ]));
        assert!(zero.is_err());

        let garbage = WorkerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/hearth"),
            ("WORKER_POLL_INTERVAL_SECS", "soon"),
        ]));
        assert!(garbage.is_err());
    }
}
