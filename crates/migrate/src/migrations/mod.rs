//! Migration engine internals
//!
//! Split the way the concerns split: source (files), ledger (database state),
//! planner (pure ordering), executor (transactions), lock (cross-process
//! exclusion).

pub mod definitions;
pub mod executor;
pub mod ledger;
pub mod lock;
pub mod planner;
pub mod source;

pub use definitions::{
    LedgerEntry, Migration, MigrationRunResult, MigrationStatus, RollbackResult,
};
pub use executor::Executor;
pub use ledger::Ledger;
pub use lock::MigrationLock;
pub use source::MigrationSource;
