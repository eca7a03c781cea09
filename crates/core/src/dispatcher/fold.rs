//! Consecutive-failure fold over a settled batch.

use crate::progress::Resolution;

/// Outcome of folding one batch into a partition's streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fold {
    /// Resolutions consumed, counted from the smallest suffix.
    pub applied: usize,
    /// Suffix of the last consumed resolution.
    pub last_suffix: Option<u32>,
    /// Streak after the last consumed resolution.
    pub streak: u32,
    /// Suffix at which the streak reached the threshold.
    pub exhausted_at: Option<u32>,
}

/// Fold resolutions in ascending suffix order.
///
/// `Found` resets the streak, anything else increments it. Folding stops at
/// the first suffix where the streak reaches `threshold`. The input order is
/// irrelevant: resolutions are sorted by suffix first.
pub fn fold_resolutions(start_streak: u32, threshold: u32, resolutions: &[(u32, Resolution)]) -> Fold {
    let mut sorted = resolutions.to_vec();
    sorted.sort_by_key(|(suffix, _)| *suffix);

    let mut fold = Fold {
        applied: 0,
        last_suffix: None,
        streak: start_streak,
        exhausted_at: None,
    };

    for (suffix, resolution) in sorted {
        fold.applied += 1;
        fold.last_suffix = Some(suffix);
        fold.streak = if resolution.is_failure() {
            fold.streak + 1
        } else {
            0
        };
        if fold.streak >= threshold {
            fold.exhausted_at = Some(suffix);
            break;
        }
    }
    fold
}

#[cfg(test)]
mod tests {
    use super::*;
    use Resolution::{Failed, Found, NotFound};

    #[test]
    fn test_found_resets_streak() {
        let fold = fold_resolutions(2, 5, &[(10, NotFound), (11, Found), (12, NotFound)]);
        assert_eq!(fold.applied, 3);
        assert_eq!(fold.last_suffix, Some(12));
        assert_eq!(fold.streak, 1);
        assert_eq!(fold.exhausted_at, None);
    }

    #[test]
    fn test_exhaustion_stops_the_fold() {
        let fold = fold_resolutions(
            0,
            3,
            &[(1, Found), (2, NotFound), (3, Failed), (4, NotFound), (5, Found)],
        );
        assert_eq!(fold.exhausted_at, Some(4));
        assert_eq!(fold.applied, 4);
        assert_eq!(fold.last_suffix, Some(4));
        assert_eq!(fold.streak, 3);
    }

    #[test]
    fn test_carried_streak_counts() {
        let fold = fold_resolutions(2, 3, &[(7, NotFound)]);
        assert_eq!(fold.exhausted_at, Some(7));
    }

    #[test]
    fn test_order_independent() {
        let ordered = [(1, Found), (2, NotFound), (3, NotFound), (4, Found), (5, NotFound)];
        let mut shuffled = ordered.to_vec();
        shuffled.reverse();
        shuffled.swap(0, 2);
        assert_eq!(
            fold_resolutions(1, 3, &ordered),
            fold_resolutions(1, 3, &shuffled)
        );
    }

    #[test]
    fn test_empty_batch() {
        let fold = fold_resolutions(4, 10, &[]);
        assert_eq!(fold.applied, 0);
        assert_eq!(fold.last_suffix, None);
        assert_eq!(fold.streak, 4);
    }
}
