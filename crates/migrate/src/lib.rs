//! # stratum-migrate: schema migrations for PostgreSQL
//!
//! Discovers paired `<id>_<label>.up.sql` / `<id>_<label>.down.sql` files,
//! diffs them against a version ledger stored in the target database, applies
//! the missing ones oldest-first inside per-migration transactions, and can
//! revert them newest-first. Concurrent runs against the same database are
//! serialized with a Postgres advisory lock.
//!
//! ```no_run
//! use stratum_migrate::{Migrator, MigratorConfig};
//!
//! # async fn run() -> Result<(), stratum_migrate::MigrateError> {
//! let migrator = Migrator::connect(MigratorConfig::from_env()?).await?;
//! let result = migrator.up(None).await?;
//! println!("applied {} migration(s)", result.applied.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod migrations;
pub mod migrator;

// Callers constructing or matching [`MigrateError::Apply`] need sqlx types.
pub use sqlx;

pub use config::{MigratorConfig, DEFAULT_LEDGER_TABLE};
pub use error::{MigrateError, MigrateResult};
pub use migrations::*;
pub use migrator::Migrator;
