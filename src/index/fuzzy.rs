//! Approximate string scoring for tag lookup.

use std::cmp::Ordering;

/// How a candidate matched, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    Exact,
    Prefix,
    Substring,
    Typo,
}

/// Score of one candidate against a query. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score {
    pub tier: MatchTier,
    pub distance: usize,
}

/// Edit budget allowed for a query of `len` characters.
#[must_use]
pub const fn max_distance(len: usize) -> usize {
    let budget = len / 3;
    if budget == 0 {
        1
    } else {
        budget
    }
}

/// Score `candidate` against `query`. Both must already be case-folded.
///
/// Returns `None` when the candidate is not a plausible match.
#[must_use]
pub fn score(query: &str, candidate: &str) -> Option<Score> {
    if query.is_empty() {
        return None;
    }

    if candidate == query {
        return Some(Score {
            tier: MatchTier::Exact,
            distance: 0,
        });
    }

    let extra = candidate.chars().count().saturating_sub(query.chars().count());

    if candidate.starts_with(query) {
        return Some(Score {
            tier: MatchTier::Prefix,
            distance: extra,
        });
    }

    if candidate.contains(query) {
        return Some(Score {
            tier: MatchTier::Substring,
            distance: extra,
        });
    }

    let q: Vec<char> = query.chars().collect();
    let c: Vec<char> = candidate.chars().collect();
    let budget = max_distance(q.len());

    // Also try the candidate truncated to the query length, so a typo in
    // the first few letters of a long value still finds it.
    let whole = osa_distance(&q, &c, budget);
    let head = if c.len() > q.len() {
        osa_distance(&q, &c[..q.len()], budget)
    } else {
        None
    };

    let distance = match (whole, head) {
        (Some(a), Some(b)) => a.min(b + 1),
        (Some(a), None) => a,
        (None, Some(b)) => b + 1,
        (None, None) => return None,
    };

    Some(Score {
        tier: MatchTier::Typo,
        distance,
    })
}

/// Optimal string alignment distance, or `None` if it exceeds `max`.
///
/// Counts insertions, deletions, substitutions and adjacent transpositions.
#[must_use]
pub fn osa_distance(a: &[char], b: &[char], max: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > max {
        return None;
    }

    let width = b.len() + 1;
    let mut prev2 = vec![0usize; width];
    let mut prev: Vec<usize> = (0..width).collect();
    let mut cur = vec![0usize; width];

    for i in 1..=a.len() {
        cur[0] = i;
        let mut row_min = cur[0];
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut value = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                value = value.min(prev2[j - 2] + 1);
            }
            cur[j] = value;
            row_min = row_min.min(value);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev2, &mut prev);
        std::mem::swap(&mut prev, &mut cur);
    }

    let distance = prev[b.len()];
    (distance <= max).then_some(distance)
}

/// Total order used to rank fuzzy matches: score, then shorter values,
/// then namespace and value text.
pub fn rank(
    a: (Score, &str, &str),
    b: (Score, &str, &str),
) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.2.chars().count().cmp(&b.2.chars().count()))
        .then_with(|| a.1.cmp(b.1))
        .then_with(|| a.2.cmp(b.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_osa_basic() {
        assert_eq!(osa_distance(&chars("cat"), &chars("cat"), 2), Some(0));
        assert_eq!(osa_distance(&chars("cat"), &chars("cut"), 2), Some(1));
        assert_eq!(osa_distance(&chars("cat"), &chars("cats"), 2), Some(1));
        assert_eq!(osa_distance(&chars("kitten"), &chars("sitting"), 3), Some(3));
    }

    #[test]
    fn test_osa_transposition_is_one_edit() {
        assert_eq!(osa_distance(&chars("dgo"), &chars("dog"), 1), Some(1));
    }

    #[test]
    fn test_osa_bound() {
        assert_eq!(osa_distance(&chars("cat"), &chars("elephant"), 2), None);
        assert_eq!(osa_distance(&chars("abc"), &chars("xyz"), 2), None);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(score("cat", "cat").unwrap().tier, MatchTier::Exact);
        assert_eq!(score("cat", "catgirl").unwrap().tier, MatchTier::Prefix);
        assert_eq!(score("cat", "bobcat").unwrap().tier, MatchTier::Substring);
        assert_eq!(score("cta", "cat").unwrap().tier, MatchTier::Typo);
        assert!(score("cat", "horse").is_none());
        assert!(score("", "cat").is_none());
    }

    #[test]
    fn test_typo_in_long_value_head() {
        let s = score("pepe", "pepa the frog").unwrap();
        assert_eq!(s.tier, MatchTier::Typo);
    }

    #[test]
    fn test_max_distance() {
        assert_eq!(max_distance(1), 1);
        assert_eq!(max_distance(5), 1);
        assert_eq!(max_distance(6), 2);
        assert_eq!(max_distance(12), 4);
    }

    #[test]
    fn test_rank_orders_by_tier_then_length() {
        let exact = score("cat", "cat").unwrap();
        let prefix = score("cat", "cats").unwrap();
        assert_eq!(
            rank((exact, "b", "cat"), (prefix, "a", "cats")),
            Ordering::Less
        );
        assert_eq!(
            rank((exact, "a", "cat"), (exact, "b", "cat")),
            Ordering::Less
        );
    }
}
