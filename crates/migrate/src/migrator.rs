//! Migrator - The public face of the engine
//!
//! Wires source, ledger, planner, executor and lock together. Every mutating
//! run follows the same shape: take the cross-process lock, ensure the
//! ledger, plan against a fresh ledger read, execute fail-fast, release the
//! lock.

use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, PgPool};

use crate::config::MigratorConfig;
use crate::error::MigrateResult;
use crate::migrations::executor::Executor;
use crate::migrations::ledger::Ledger;
use crate::migrations::lock::MigrationLock;
use crate::migrations::planner;
use crate::migrations::source::MigrationSource;
use crate::migrations::{Migration, MigrationRunResult, MigrationStatus, RollbackResult};

/// Schema migration engine for one target database
pub struct Migrator {
    config: MigratorConfig,
    source: MigrationSource,
    ledger: Ledger,
    lock: MigrationLock,
    pool: PgPool,
}

impl Migrator {
    /// Build a migrator over an existing pool. Used by tests and by
    /// applications that embed the engine next to their own pool.
    pub fn new(config: MigratorConfig, pool: PgPool) -> MigrateResult<Self> {
        config.validate()?;
        let source = MigrationSource::new(config.migrations_dir.clone());
        let ledger = Ledger::new(config.ledger_table.clone());
        let lock = MigrationLock::new(&config.ledger_table, config.lock_timeout);
        Ok(Self {
            config,
            source,
            ledger,
            lock,
            pool,
        })
    }

    /// Connect to the configured database and build a migrator.
    pub async fn connect(config: MigratorConfig) -> MigrateResult<Self> {
        config.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;
        Self::new(config, pool)
    }

    pub fn source(&self) -> &MigrationSource {
        &self.source
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations, oldest first, at most `limit` of them.
    pub async fn up(&self, limit: Option<usize>) -> MigrateResult<MigrationRunResult> {
        let migrations = self.source.load()?;

        let mut lock_conn = self.lock_connection().await?;
        self.lock.acquire(&mut lock_conn).await?;

        // Ledger creation and planning happen under the lock: another process
        // may have initialized or advanced the ledger while we waited.
        let run = async {
            self.ledger.ensure(&self.pool).await?;
            let applied = self.ledger.applied_ids(&self.pool).await?;
            let mut plan = planner::pending_up(&migrations, &applied);
            if let Some(limit) = limit {
                plan.truncate(limit);
            }

            if plan.is_empty() {
                tracing::info!(applied = applied.len(), "no pending migrations");
            }

            Executor::new(&self.pool, &self.ledger)
                .apply_all(&plan, applied.len())
                .await
        }
        .await;

        self.release(&mut lock_conn).await;
        run
    }

    /// Revert the `n` most recently applied migrations, newest first.
    pub async fn down(&self, n: usize) -> MigrateResult<RollbackResult> {
        let migrations = self.source.load()?;

        let mut lock_conn = self.lock_connection().await?;
        self.lock.acquire(&mut lock_conn).await?;

        let run = async {
            self.ledger.ensure(&self.pool).await?;
            let applied = self.ledger.applied_ids(&self.pool).await?;
            let plan = planner::pending_down(&migrations, &applied, n)?;

            Executor::new(&self.pool, &self.ledger).revert_all(&plan).await
        }
        .await;

        self.release(&mut lock_conn).await;
        run
    }

    /// Applied/pending status for every migration the source knows about.
    /// Read-only; takes no lock.
    pub async fn status(&self) -> MigrateResult<Vec<(Migration, MigrationStatus)>> {
        let migrations = self.source.load()?;
        self.ledger.ensure(&self.pool).await?;

        let entries = self.ledger.entries(&self.pool).await?;
        let applied_at: std::collections::BTreeMap<_, _> =
            entries.into_iter().map(|e| (e.id, e.applied_at)).collect();

        Ok(migrations
            .into_iter()
            .map(|m| {
                let status = match applied_at.get(&m.id) {
                    Some(at) => MigrationStatus::Applied { applied_at: *at },
                    None => MigrationStatus::Pending,
                };
                (m, status)
            })
            .collect())
    }

    /// Dedicated connection for the advisory lock. Held outside the pool so
    /// the session (and therefore the lock) lives exactly as long as the run:
    /// if the process is killed, the server drops the session and frees the
    /// lock.
    async fn lock_connection(&self) -> MigrateResult<PgConnection> {
        Ok(PgConnection::connect(&self.config.database_url).await?)
    }

    async fn release(&self, conn: &mut PgConnection) {
        if let Err(e) = self.lock.release(conn).await {
            // the session closing will free the lock anyway
            tracing::warn!("failed to release migration lock: {}", e);
        }
    }

    /// Convenience constructor from the environment.
    pub async fn from_env() -> MigrateResult<Self> {
        Self::connect(MigratorConfig::from_env()?).await
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("migrations_dir", &self.config.migrations_dir)
            .field("ledger_table", &self.config.ledger_table)
            .finish()
    }
}
