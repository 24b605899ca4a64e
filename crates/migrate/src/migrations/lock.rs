//! Migration Lock - Cross-process mutual exclusion
//!
//! Two deploy jobs racing to migrate the same database must serialize, and no
//! in-memory mutex can do that. The lock is a Postgres session-level advisory
//! lock held on a dedicated connection for the duration of the run. If the
//! process dies, the session dies and the server releases the lock.

use std::time::{Duration, Instant};

use sqlx::{PgConnection, Row};

use crate::error::{MigrateError, MigrateResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Advisory-lock coordinator for migration runs
#[derive(Debug, Clone)]
pub struct MigrationLock {
    key: i64,
    timeout: Duration,
}

impl MigrationLock {
    /// The lock key is derived from the ledger table name, so tools using
    /// different ledger tables on the same database never contend.
    pub fn new(ledger_table: &str, timeout: Duration) -> Self {
        Self {
            key: lock_key(ledger_table),
            timeout,
        }
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    /// Poll `pg_try_advisory_lock` until it succeeds or the timeout elapses.
    ///
    /// The lock binds to `conn`'s session; the caller must keep that
    /// connection open until [`release`](Self::release).
    pub async fn acquire(&self, conn: &mut PgConnection) -> MigrateResult<()> {
        let start = Instant::now();
        loop {
            let row = sqlx::query("SELECT pg_try_advisory_lock($1)")
                .bind(self.key)
                .fetch_one(&mut *conn)
                .await?;
            if row.try_get::<bool, _>(0)? {
                tracing::debug!(key = self.key, "acquired migration lock");
                return Ok(());
            }

            if start.elapsed() >= self.timeout {
                return Err(MigrateError::LockTimeout {
                    waited_secs: start.elapsed().as_secs(),
                });
            }

            tracing::debug!(key = self.key, "migration lock held elsewhere, waiting");
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Release the lock. Idempotent: unlocking a lock this session does not
    /// hold is a no-op reported by the server.
    pub async fn release(&self, conn: &mut PgConnection) -> MigrateResult<()> {
        let row = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .fetch_one(&mut *conn)
            .await?;
        if !row.try_get::<bool, _>(0)? {
            tracing::debug!(key = self.key, "release of a lock that was not held");
        }
        Ok(())
    }
}

/// Stable 64-bit FNV-1a hash of the ledger table name, folded to the signed
/// key space `pg_advisory_lock` expects.
fn lock_key(table: &str) -> i64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    for byte in table.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash as i64
}
