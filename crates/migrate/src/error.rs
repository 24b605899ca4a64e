//! Error types for the migration engine
//!
//! Load-time errors (bad filenames, duplicate identities) surface before any
//! database mutation. Execution-time errors carry the migration id and the
//! statement that failed so the caller can report the exact point of failure.

use std::path::PathBuf;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Two migration files declare the same identity token
    #[error("duplicate migration identity '{id}' in {file}")]
    DuplicateIdentity { id: String, file: PathBuf },

    /// A migration file does not follow the naming or pairing convention
    #[error("malformed migration {file}: {reason}")]
    MalformedMigration { file: PathBuf, reason: String },

    /// Another process held the migration lock past the configured timeout
    #[error("timed out waiting for migration lock after {waited_secs}s")]
    LockTimeout { waited_secs: u64 },

    /// A statement in an up/down body failed; the whole transaction was rolled back
    #[error("migration {id} failed on statement `{statement}`: {source}")]
    Apply {
        id: String,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    /// Revert was requested for a migration with no down statements
    #[error("migration {id} has no down statements and cannot be reverted")]
    Irreversible { id: String },

    /// The ledger records an applied migration that no longer exists on disk
    #[error("applied migration {id} has no matching file; cannot revert it")]
    UnknownApplied { id: String },

    /// Database connection or query error outside a migration body
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error while reading the migrations directory
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MigrateError {
    /// True for errors raised before any database mutation was attempted.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            MigrateError::DuplicateIdentity { .. }
                | MigrateError::MalformedMigration { .. }
                | MigrateError::Configuration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_error_names_migration_and_statement() {
        let err = MigrateError::Apply {
            id: "20240101_120000".to_string(),
            statement: "ALTER TABLE users ADD CONSTRAINT users_email_unique UNIQUE (email);"
                .to_string(),
            source: sqlx::Error::PoolClosed,
        };
        let msg = err.to_string();
        assert!(msg.contains("20240101_120000"));
        assert!(msg.contains("users_email_unique"));
    }

    #[test]
    fn load_error_classification() {
        let dup = MigrateError::DuplicateIdentity {
            id: "0001".to_string(),
            file: PathBuf::from("0001_b.up.sql"),
        };
        assert!(dup.is_load_error());
        assert!(!MigrateError::Irreversible { id: "0001".into() }.is_load_error());
    }
}
