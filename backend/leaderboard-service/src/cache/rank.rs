//! Batched rank lookup helpers.
//!
//! A cache page of N members usually holds far fewer distinct ratings. The page
//! is grouped by score, one `count_above` is asked per distinct score, and the
//! answers are scattered back to every member that shares it.

use std::collections::HashMap;

/// Distinct scores of a page plus, for each page position, which one it uses
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScoreGroups {
    pub distinct: Vec<i64>,
    slots: Vec<usize>,
}

impl ScoreGroups {
    pub fn from_scores(scores: impl IntoIterator<Item = i64>) -> Self {
        let mut index: HashMap<i64, usize> = HashMap::new();
        let mut groups = Self::default();

        for score in scores {
            let slot = *index.entry(score).or_insert_with(|| {
                groups.distinct.push(score);
                groups.distinct.len() - 1
            });
            groups.slots.push(slot);
        }

        groups
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Turn per-score "strictly above" counts into per-member ranks.
    ///
    /// Returns `None` if `counts` does not line up with `distinct`.
    pub fn ranks(&self, counts: &[i64]) -> Option<Vec<i64>> {
        if counts.len() != self.distinct.len() {
            return None;
        }
        Some(self.slots.iter().map(|&slot| counts[slot] + 1).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_collapse_ties() {
        let groups = ScoreGroups::from_scores([900, 500, 500, 300, 500]);
        assert_eq!(groups.distinct, vec![900, 500, 300]);
        assert_eq!(groups.ranks(&[0, 1, 4]), Some(vec![1, 2, 2, 5, 2]));
    }

    #[test]
    fn test_mismatched_counts() {
        let groups = ScoreGroups::from_scores([10, 20]);
        assert_eq!(groups.ranks(&[0]), None);
    }

    #[test]
    fn test_empty_page() {
        let groups = ScoreGroups::from_scores(std::iter::empty());
        assert!(groups.is_empty());
        assert_eq!(groups.ranks(&[]), Some(vec![]));
    }
}
