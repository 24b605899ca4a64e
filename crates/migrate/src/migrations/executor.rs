//! Migration Executor - Applies and reverts migrations transactionally
//!
//! One transaction per migration: every statement in the body plus the ledger
//! write commit together or not at all. Multi-migration runs are fail-fast;
//! migrations committed before a failure stay committed and recorded.

use sqlx::PgPool;

use super::definitions::{Migration, MigrationRunResult, RollbackResult};
use super::ledger::Ledger;
use crate::error::{MigrateError, MigrateResult};

/// Executes migration bodies against a database
pub struct Executor<'a> {
    pool: &'a PgPool,
    ledger: &'a Ledger,
}

impl<'a> Executor<'a> {
    pub fn new(pool: &'a PgPool, ledger: &'a Ledger) -> Self {
        Self { pool, ledger }
    }

    /// Apply one migration: begin, run every up statement in order, record it
    /// in the ledger, commit. Any failure rolls back the whole transaction.
    pub async fn apply_one(&self, migration: &Migration) -> MigrateResult<()> {
        tracing::info!(id = %migration.id, label = %migration.label, "applying migration");

        let mut tx = self.pool.begin().await?;

        for statement in &migration.up_statements {
            if let Err(e) = sqlx::query(statement).execute(&mut *tx).await {
                // the statement error is the one worth reporting
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(id = %migration.id, "rollback failed: {}", rb);
                }
                return Err(MigrateError::Apply {
                    id: migration.id.clone(),
                    statement: statement.clone(),
                    source: e,
                });
            }
        }

        self.ledger.record_applied(&mut tx, &migration.id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Revert one migration: begin, run every down statement in order, remove
    /// its ledger row, commit. Fails up front if the migration is
    /// irreversible.
    pub async fn revert_one(&self, migration: &Migration) -> MigrateResult<()> {
        if !migration.is_reversible() {
            return Err(MigrateError::Irreversible {
                id: migration.id.clone(),
            });
        }

        tracing::info!(id = %migration.id, label = %migration.label, "reverting migration");

        let mut tx = self.pool.begin().await?;

        for statement in &migration.down_statements {
            if let Err(e) = sqlx::query(statement).execute(&mut *tx).await {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(id = %migration.id, "rollback failed: {}", rb);
                }
                return Err(MigrateError::Apply {
                    id: migration.id.clone(),
                    statement: statement.clone(),
                    source: e,
                });
            }
        }

        self.ledger.record_reverted(&mut tx, &migration.id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Apply a planner-ordered list, fail-fast. The returned result covers
    /// only what committed; a failure after k migrations leaves those k
    /// applied and recorded.
    pub async fn apply_all(
        &self,
        plan: &[&Migration],
        skipped_count: usize,
    ) -> MigrateResult<MigrationRunResult> {
        let start = std::time::Instant::now();
        let mut applied = Vec::with_capacity(plan.len());

        for migration in plan {
            if let Err(e) = self.apply_one(migration).await {
                tracing::error!(
                    id = %migration.id,
                    applied = applied.len(),
                    remaining = plan.len() - applied.len(),
                    "migration run aborted"
                );
                return Err(e);
            }
            applied.push(migration.id.clone());
        }

        Ok(MigrationRunResult {
            applied,
            skipped_count,
            execution_time_ms: start.elapsed().as_millis(),
        })
    }

    /// Revert a planner-ordered (newest-first) list, fail-fast.
    pub async fn revert_all(&self, plan: &[&Migration]) -> MigrateResult<RollbackResult> {
        let start = std::time::Instant::now();
        let mut reverted = Vec::with_capacity(plan.len());

        for migration in plan {
            if let Err(e) = self.revert_one(migration).await {
                tracing::error!(
                    id = %migration.id,
                    reverted = reverted.len(),
                    "rollback run aborted"
                );
                return Err(e);
            }
            reverted.push(migration.id.clone());
        }

        Ok(RollbackResult {
            reverted,
            execution_time_ms: start.elapsed().as_millis(),
        })
    }
}
