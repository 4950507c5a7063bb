//! Predecessor graph over the snapshots of one migrations folder.

use std::collections::HashSet;

use super::{Snapshot, ORIGIN_ID};
use crate::error::{Result, SnapshotError};

/// Checks that ids are unique and every `prevIds` entry resolves to a known
/// snapshot or to [`ORIGIN_ID`].
///
/// # Errors
///
/// Returns [`SnapshotError::DuplicateId`] or
/// [`SnapshotError::UnknownPredecessor`] for the first problem found.
pub fn validate(snapshots: &[Snapshot]) -> Result<()> {
    let mut ids = HashSet::new();
    for snapshot in snapshots {
        if !ids.insert(snapshot.id.as_str()) {
            return Err(SnapshotError::DuplicateId(snapshot.id.clone()).into());
        }
    }
    for snapshot in snapshots {
        for prev in &snapshot.prev_ids {
            if prev != ORIGIN_ID && !ids.contains(prev.as_str()) {
                return Err(SnapshotError::UnknownPredecessor {
                    id: snapshot.id.clone(),
                    prev_id: prev.clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Snapshots no other snapshot descends from, in input order.
#[must_use]
pub fn heads(snapshots: &[Snapshot]) -> Vec<&Snapshot> {
    let referenced: HashSet<&str> = snapshots
        .iter()
        .flat_map(|s| s.prev_ids.iter().map(String::as_str))
        .collect();
    snapshots
        .iter()
        .filter(|s| !referenced.contains(s.id.as_str()))
        .collect()
}

/// More than one head means two branches generated migrations from the
/// same parent.
#[must_use]
pub fn has_diverged(snapshots: &[Snapshot]) -> bool {
    heads(snapshots).len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;

    fn snap(id: &str, prev: &[&str]) -> Snapshot {
        let mut s = Snapshot::origin(DialectKind::Postgresql);
        s.id = id.to_string();
        s.prev_ids = prev.iter().map(|p| (*p).to_string()).collect();
        s
    }

    #[test]
    fn linear_history_has_one_head() {
        let chain = vec![snap("a", &[ORIGIN_ID]), snap("b", &["a"]), snap("c", &["b"])];
        validate(&chain).unwrap();
        let heads = heads(&chain);
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].id, "c");
        assert!(!has_diverged(&chain));
    }

    #[test]
    fn sibling_migrations_diverge() {
        let chain = vec![snap("a", &[ORIGIN_ID]), snap("b", &["a"]), snap("c", &["a"])];
        validate(&chain).unwrap();
        assert!(has_diverged(&chain));

        let merged = vec![
            snap("a", &[ORIGIN_ID]),
            snap("b", &["a"]),
            snap("c", &["a"]),
            snap("d", &["b", "c"]),
        ];
        assert!(!has_diverged(&merged));
    }

    #[test]
    fn dangling_and_duplicate_ids_fail() {
        let err = validate(&[snap("a", &["missing"])]).unwrap_err();
        assert!(err.to_string().contains("unknown predecessor `missing`"));

        let err = validate(&[snap("a", &[ORIGIN_ID]), snap("a", &[ORIGIN_ID])]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
