//! Command handlers and flag-over-env configuration layering.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use stratum_migrate::{
    MigrateError, MigrateResult, MigrationSource, MigrationStatus, Migrator, MigratorConfig,
    DEFAULT_LEDGER_TABLE,
};

/// Global flag values; anything unset falls back to the environment.
pub struct Overrides {
    pub migrations_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    pub lock_timeout: Option<u64>,
}

impl Overrides {
    fn migrations_dir(&self) -> PathBuf {
        self.migrations_dir
            .clone()
            .or_else(|| env::var("STRATUM_MIGRATIONS_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("migrations"))
    }

    fn config(&self) -> MigrateResult<MigratorConfig> {
        let database_url = self
            .database_url
            .clone()
            .or_else(|| env::var("DATABASE_URL").ok())
            .ok_or_else(|| {
                MigrateError::Configuration(
                    "DATABASE_URL must be set (or pass --database-url)".to_string(),
                )
            })?;

        let lock_timeout = match self.lock_timeout {
            Some(secs) => Duration::from_secs(secs),
            None => match env::var("STRATUM_LOCK_TIMEOUT_SECS") {
                Ok(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                    MigrateError::Configuration(format!(
                        "STRATUM_LOCK_TIMEOUT_SECS must be an integer, got '{}'",
                        raw
                    ))
                })?),
                Err(_) => Duration::from_secs(30),
            },
        };

        let config = MigratorConfig {
            database_url,
            migrations_dir: self.migrations_dir(),
            ledger_table: env::var("STRATUM_LEDGER_TABLE")
                .unwrap_or_else(|_| DEFAULT_LEDGER_TABLE.to_string()),
            lock_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}

pub async fn up(overrides: &Overrides, n: Option<usize>) -> MigrateResult<()> {
    let migrator = Migrator::connect(overrides.config()?).await?;
    let result = migrator.up(n).await?;

    if result.applied.is_empty() {
        println!("Nothing to apply ({} already applied)", result.skipped_count);
    } else {
        for id in &result.applied {
            println!("Applied {}", id);
        }
        println!(
            "Applied {} migration(s) in {}ms",
            result.applied.len(),
            result.execution_time_ms
        );
    }
    Ok(())
}

pub async fn down(overrides: &Overrides, n: usize) -> MigrateResult<()> {
    let migrator = Migrator::connect(overrides.config()?).await?;
    let result = migrator.down(n).await?;

    if result.reverted.is_empty() {
        println!("Nothing to revert");
    } else {
        for id in &result.reverted {
            println!("Reverted {}", id);
        }
        println!(
            "Reverted {} migration(s) in {}ms",
            result.reverted.len(),
            result.execution_time_ms
        );
    }
    Ok(())
}

pub async fn status(overrides: &Overrides) -> MigrateResult<()> {
    let migrator = Migrator::connect(overrides.config()?).await?;
    let statuses = migrator.status().await?;

    println!("Migration Status:");
    println!("================");

    if statuses.is_empty() {
        println!("No migrations found");
        return Ok(());
    }

    let mut pending = 0usize;
    for (migration, status) in &statuses {
        match status {
            MigrationStatus::Applied { applied_at } => {
                println!(
                    "  ✓ {} {} (applied {})",
                    migration.id,
                    migration.label,
                    applied_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            MigrationStatus::Pending => {
                pending += 1;
                println!("  ⏳ {} {}", migration.id, migration.label);
            }
        }
    }
    println!("\n{} pending, {} total", pending, statuses.len());
    Ok(())
}

pub fn new(overrides: &Overrides, name: &str) -> MigrateResult<()> {
    let source = MigrationSource::new(overrides.migrations_dir());
    let (up, down) = source.create(name)?;
    println!("Created {}", source.dir().join(up).display());
    println!("Created {}", source.dir().join(down).display());
    Ok(())
}
