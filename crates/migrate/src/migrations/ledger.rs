//! Version Ledger - Persistent record of applied migrations
//!
//! The ledger is a table inside the target database itself, so applied-state
//! survives across processes and hosts. Rows are only ever written or removed
//! inside the executor's transaction; there is no standalone mutation path.

use std::collections::BTreeSet;

use sqlx::{PgPool, Postgres, Row, Transaction};

use super::definitions::LedgerEntry;
use crate::error::MigrateResult;

/// Handle to the ledger table
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    /// Create a handle for a validated table name (see
    /// [`MigratorConfig::validate`](crate::MigratorConfig::validate)).
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if it does not exist. Safe to call on every
    /// run, including against a database that has never been migrated.
    pub async fn ensure(&self, pool: &PgPool) -> MigrateResult<()> {
        sqlx::query(&self.create_table_sql()).execute(pool).await?;
        Ok(())
    }

    /// Ids of currently-applied migrations, ascending.
    pub async fn applied_ids(&self, pool: &PgPool) -> MigrateResult<BTreeSet<String>> {
        let rows = sqlx::query(&self.select_ids_sql()).fetch_all(pool).await?;
        let mut ids = BTreeSet::new();
        for row in rows {
            ids.insert(row.try_get::<String, _>("id")?);
        }
        Ok(ids)
    }

    /// Full ledger entries, ascending by id.
    pub async fn entries(&self, pool: &PgPool) -> MigrateResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(&self.select_entries_sql()).fetch_all(pool).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(LedgerEntry {
                id: row.try_get("id")?,
                applied_at: row.try_get("applied_at")?,
            });
        }
        Ok(entries)
    }

    /// Record a migration as applied. Must run inside the same transaction as
    /// the migration's statements.
    pub async fn record_applied(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
    ) -> MigrateResult<()> {
        sqlx::query(&self.insert_sql())
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Remove a migration's ledger row. Must run inside the same transaction
    /// as the migration's down statements.
    pub async fn record_reverted(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
    ) -> MigrateResult<()> {
        sqlx::query(&self.delete_sql())
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id VARCHAR(255) PRIMARY KEY,\n    \
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()\n\
            );",
            self.table
        )
    }

    fn select_ids_sql(&self) -> String {
        format!("SELECT id FROM {} ORDER BY id ASC", self.table)
    }

    fn select_entries_sql(&self) -> String {
        format!("SELECT id, applied_at FROM {} ORDER BY id ASC", self.table)
    }

    fn insert_sql(&self) -> String {
        format!("INSERT INTO {} (id) VALUES ($1)", self.table)
    }

    fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE id = $1", self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LEDGER_TABLE;

    #[test]
    fn ledger_sql_generation() {
        let ledger = Ledger::new(DEFAULT_LEDGER_TABLE);

        let create = ledger.create_table_sql();
        assert!(create.contains("CREATE TABLE IF NOT EXISTS _stratum_migrations"));
        assert!(create.contains("id VARCHAR(255) PRIMARY KEY"));
        assert!(create.contains("applied_at TIMESTAMPTZ"));

        assert_eq!(
            ledger.insert_sql(),
            "INSERT INTO _stratum_migrations (id) VALUES ($1)"
        );
        assert_eq!(
            ledger.delete_sql(),
            "DELETE FROM _stratum_migrations WHERE id = $1"
        );
        assert!(ledger.select_ids_sql().ends_with("ORDER BY id ASC"));
    }

    #[test]
    fn custom_table_name_flows_through() {
        let ledger = Ledger::new("deploy_versions");
        assert!(ledger.create_table_sql().contains("deploy_versions"));
        assert_eq!(ledger.table(), "deploy_versions");
    }
}
