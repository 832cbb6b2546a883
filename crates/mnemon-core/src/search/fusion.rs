//! Rank fusion of a semantic ranking with a metadata candidate set.

use std::collections::HashSet;

use crate::types::ObservationId;

/// Keep `ranked` ids that are metadata candidates, in ranked order, once each.
///
/// The semantic ranking decides order; the candidate set decides membership.
pub fn fuse_ranked_ids(
    ranked: &[ObservationId],
    candidates: &HashSet<ObservationId>,
) -> Vec<ObservationId> {
    let mut kept = HashSet::with_capacity(candidates.len());
    ranked
        .iter()
        .copied()
        .filter(|id| candidates.contains(id) && kept.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[ObservationId]) -> HashSet<ObservationId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_ranked_order_filtered_by_candidates() {
        assert_eq!(fuse_ranked_ids(&[3, 1, 2, 9], &set(&[1, 2, 3])), vec![3, 1, 2]);
    }

    #[test]
    fn test_duplicates_kept_once() {
        assert_eq!(fuse_ranked_ids(&[3, 3, 1, 3], &set(&[1, 3])), vec![3, 1]);
    }

    #[test]
    fn test_disjoint_is_empty() {
        assert!(fuse_ranked_ids(&[7, 8], &set(&[1, 2])).is_empty());
        assert!(fuse_ranked_ids(&[], &set(&[1])).is_empty());
    }

    #[test]
    fn test_candidates_missing_from_ranking_are_dropped() {
        assert_eq!(fuse_ranked_ids(&[2], &set(&[1, 2, 3])), vec![2]);
    }
}
