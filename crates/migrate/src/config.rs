//! Configuration for the migration engine
//!
//! All settings come from the environment with sensible defaults, so the CLI
//! works against the same `DATABASE_URL` the application itself uses.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{MigrateError, MigrateResult};

/// Default ledger table name. The leading underscore keeps it out of the way
/// of application-owned tables.
pub const DEFAULT_LEDGER_TABLE: &str = "_stratum_migrations";

/// Configuration for a [`Migrator`](crate::Migrator)
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Postgres connection string
    pub database_url: String,
    /// Directory holding `<id>_<label>.up.sql` / `.down.sql` pairs
    pub migrations_dir: PathBuf,
    /// Table the ledger lives in
    pub ledger_table: String,
    /// How long to wait for another process to release the migration lock
    pub lock_timeout: Duration,
}

impl MigratorConfig {
    /// Build a configuration from `DATABASE_URL` plus optional
    /// `STRATUM_MIGRATIONS_DIR`, `STRATUM_LEDGER_TABLE` and
    /// `STRATUM_LOCK_TIMEOUT_SECS` overrides.
    pub fn from_env() -> MigrateResult<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| MigrateError::Configuration("DATABASE_URL must be set".to_string()))?;

        let migrations_dir = env::var("STRATUM_MIGRATIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("migrations"));

        let ledger_table = env::var("STRATUM_LEDGER_TABLE")
            .unwrap_or_else(|_| DEFAULT_LEDGER_TABLE.to_string());

        let lock_timeout = match env::var("STRATUM_LOCK_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    MigrateError::Configuration(format!(
                        "STRATUM_LOCK_TIMEOUT_SECS must be an integer, got '{}'",
                        raw
                    ))
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(30),
        };

        let config = Self {
            database_url,
            migrations_dir,
            ledger_table,
            lock_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that would otherwise fail deep inside a run.
    pub fn validate(&self) -> MigrateResult<()> {
        if self.database_url.is_empty() {
            return Err(MigrateError::Configuration(
                "database_url must not be empty".to_string(),
            ));
        }
        if self.ledger_table.is_empty()
            || !self
                .ledger_table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(MigrateError::Configuration(format!(
                "ledger_table must be a plain identifier, got '{}'",
                self.ledger_table
            )));
        }
        Ok(())
    }
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            migrations_dir: PathBuf::from("migrations"),
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
            lock_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let mut config = MigratorConfig::default();
        config.database_url = "postgres://localhost/app".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger_table, DEFAULT_LEDGER_TABLE);
    }

    #[test]
    fn rejects_quoted_ledger_table() {
        let config = MigratorConfig {
            database_url: "postgres://localhost/app".to_string(),
            ledger_table: "bad\"; DROP TABLE users; --".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MigrateError::Configuration(_))
        ));
    }
}
