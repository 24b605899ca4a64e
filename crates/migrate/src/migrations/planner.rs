//! Migration Planner - Computes pending and revertible migrations
//!
//! Pure functions over the source's descriptors and the ledger's applied set.
//! Keeping planning free of I/O makes the ordering guarantees directly
//! testable.

use std::collections::BTreeSet;

use super::definitions::Migration;
use crate::error::{MigrateError, MigrateResult};

/// Migrations not yet applied, oldest first.
///
/// Ascending id order is the only correct apply order: later migrations may
/// assume the schema state earlier ones created.
pub fn pending_up<'a>(
    migrations: &'a [Migration],
    applied: &BTreeSet<String>,
) -> Vec<&'a Migration> {
    migrations
        .iter()
        .filter(|m| !applied.contains(&m.id))
        .collect()
}

/// The `n` most recently applied migrations, newest first.
///
/// Reversal must undo the newest change first; anything it introduced may be
/// depended on by nothing, while older migrations may be depended on by it.
/// Fails with [`MigrateError::UnknownApplied`] when an applied id has no
/// descriptor on disk, because a migration that cannot be found cannot be
/// reverted.
pub fn pending_down<'a>(
    migrations: &'a [Migration],
    applied: &BTreeSet<String>,
    n: usize,
) -> MigrateResult<Vec<&'a Migration>> {
    let mut plan = Vec::with_capacity(n.min(applied.len()));
    for id in applied.iter().rev().take(n) {
        let migration = migrations
            .iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| MigrateError::UnknownApplied { id: id.clone() })?;
        plan.push(migration);
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn migration(id: &str) -> Migration {
        Migration {
            id: id.to_string(),
            label: format!("m{}", id),
            up_statements: vec![format!("CREATE TABLE t{} (id INT);", id)],
            down_statements: vec![format!("DROP TABLE t{};", id)],
            created_at: Utc::now(),
        }
    }

    fn applied(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pending_up_is_strictly_ascending() {
        // deliberately constructed out of order, the source sorts on load
        let mut migrations = vec![migration("0003"), migration("0001"), migration("0002")];
        migrations.sort_by(|a, b| a.id.cmp(&b.id));

        let plan = pending_up(&migrations, &applied(&[]));
        let ids: Vec<_> = plan.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["0001", "0002", "0003"]);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn pending_up_skips_applied() {
        let migrations = vec![migration("0001"), migration("0002"), migration("0003")];
        let plan = pending_up(&migrations, &applied(&["0001", "0003"]));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].id, "0002");
    }

    #[test]
    fn fully_applied_source_plans_nothing() {
        let migrations = vec![migration("0001"), migration("0002")];
        assert!(pending_up(&migrations, &applied(&["0001", "0002"])).is_empty());
    }

    #[test]
    fn pending_down_is_strictly_descending() {
        let migrations = vec![migration("0001"), migration("0002"), migration("0003")];
        let plan = pending_down(&migrations, &applied(&["0001", "0002", "0003"]), 3).unwrap();
        let ids: Vec<_> = plan.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["0003", "0002", "0001"]);
        assert!(ids.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn pending_down_takes_only_n_newest() {
        let migrations = vec![migration("0001"), migration("0002"), migration("0003")];
        let plan = pending_down(&migrations, &applied(&["0001", "0002", "0003"]), 1).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].id, "0003");
    }

    #[test]
    fn pending_down_more_than_applied_is_all_of_them() {
        let migrations = vec![migration("0001"), migration("0002")];
        let plan = pending_down(&migrations, &applied(&["0001", "0002"]), 10).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn unknown_applied_id_fails_down_planning() {
        let migrations = vec![migration("0001")];
        let err = pending_down(&migrations, &applied(&["0001", "0099"]), 2).unwrap_err();
        assert!(matches!(err, MigrateError::UnknownApplied { ref id } if id == "0099"));
    }

    #[test]
    fn unknown_applied_id_does_not_affect_forward_planning() {
        // a ledger entry whose file was deleted must not block new migrations
        let migrations = vec![migration("0002")];
        let plan = pending_up(&migrations, &applied(&["0001"]));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].id, "0002");
    }
}
