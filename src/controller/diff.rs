//! # Pool Set Differencer
//!
//! Splits the desired and previously applied pool lists into added, removed and
//! unchanged pools.

use std::collections::HashSet;

/// Result of comparing desired pools against the applied ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolDiff {
    /// In desired but not applied, in desired order
    pub added: Vec<String>,
    /// Applied but no longer desired, in applied order
    pub removed: Vec<String>,
    /// In both, in desired order
    pub unchanged: Vec<String>,
}

impl PoolDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.unchanged.is_empty()
    }
}

#[must_use]
pub fn diff(desired: &[String], current: &[String]) -> PoolDiff {
    let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();

    let (unchanged, added): (Vec<String>, Vec<String>) = desired
        .iter()
        .cloned()
        .partition(|p| current_set.contains(p.as_str()));
    let removed = current
        .iter()
        .filter(|p| !desired_set.contains(p.as_str()))
        .cloned()
        .collect();

    PoolDiff {
        added,
        removed,
        unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_diff_overlapping_sets() {
        let d = diff(&pools(&["a", "b"]), &pools(&["b", "c"]));
        assert_eq!(d.added, pools(&["a"]));
        assert_eq!(d.removed, pools(&["c"]));
        assert_eq!(d.unchanged, pools(&["b"]));
    }

    #[test]
    fn test_diff_empty_inputs() {
        let d = diff(&[], &[]);
        assert!(d.is_empty());
        assert_eq!(d, PoolDiff::default());
    }

    #[test]
    fn test_diff_preserves_order() {
        let d = diff(&pools(&["z", "y", "x", "w"]), &pools(&["q", "x", "p", "z"]));
        assert_eq!(d.added, pools(&["y", "w"]));
        assert_eq!(d.removed, pools(&["q", "p"]));
        assert_eq!(d.unchanged, pools(&["z", "x"]));
    }

    #[test]
    fn test_diff_covers_union_exactly_once() {
        let desired = pools(&["a", "b", "c", "d"]);
        let current = pools(&["c", "d", "e", "f", "g"]);
        let d = diff(&desired, &current);

        let mut seen: Vec<String> = d
            .added
            .iter()
            .chain(&d.removed)
            .chain(&d.unchanged)
            .cloned()
            .collect();
        seen.sort();
        assert_eq!(seen, pools(&["a", "b", "c", "d", "e", "f", "g"]));
    }

    #[test]
    fn test_diff_all_added_or_all_removed() {
        let d = diff(&pools(&["a"]), &[]);
        assert_eq!(d.added, pools(&["a"]));
        assert!(d.removed.is_empty() && d.unchanged.is_empty());

        let d = diff(&[], &pools(&["a"]));
        assert_eq!(d.removed, pools(&["a"]));
        assert!(d.added.is_empty() && d.unchanged.is_empty());
    }
}
