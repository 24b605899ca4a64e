//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the fundamental types used throughout the migration system
//! including the Migration descriptor, ledger entries and run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable description of one schema migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    /// Ordering identity, typically a zero-padded timestamp. Sorting these
    /// lexicographically is the only ordering the engine uses.
    pub id: String,
    /// Human-readable slug from the filename, informational only
    pub label: String,
    /// Forward statements, executed in order
    pub up_statements: Vec<String>,
    /// Reverse statements, executed in order. Empty means irreversible.
    pub down_statements: Vec<String>,
    /// When the migration was authored, parsed from the id when possible
    pub created_at: DateTime<Utc>,
}

impl Migration {
    /// Whether this migration can be reverted
    pub fn is_reversible(&self) -> bool {
        !self.down_statements.is_empty()
    }
}

/// One row of the version ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Migration id
    pub id: String,
    /// When the migration was committed
    pub applied_at: DateTime<Utc>,
}

/// Migration status as reported by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Not yet applied to the target database
    Pending,
    /// Applied at the given time
    Applied { applied_at: DateTime<Utc> },
}

/// Result of running pending migrations
#[derive(Debug)]
pub struct MigrationRunResult {
    /// Ids of migrations that were applied, in apply order
    pub applied: Vec<String>,
    /// Number of migrations that were already applied and skipped
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Result of reverting applied migrations
#[derive(Debug)]
pub struct RollbackResult {
    /// Ids of migrations that were reverted, newest first
    pub reverted: Vec<String>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}
