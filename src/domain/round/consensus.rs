//! Consensus calculator - pure aggregate statistics over a vote set.
//!
//! Numeric card tokens feed the average and median; special tokens ("?",
//! "∞", a break card) count as votes but carry no numeric weight. Consensus
//! requires at least one numeric value and a spread strictly below the
//! threshold.

use serde::{Deserialize, Serialize};

use super::vote::CardValue;

/// Spread threshold for consensus; compared with a strict `<`.
///
/// A spread exactly at the threshold (e.g. votes 3 and 5) does not count
/// as consensus.
pub const CONSENSUS_SPREAD: f64 = 2.0;

/// Aggregate statistics for a revealed round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoteStats {
    /// Mean of numeric votes; None when no numeric votes exist.
    pub average: Option<f64>,

    /// Median of numeric votes; None when no numeric votes exist.
    pub median: Option<f64>,

    /// Whether the numeric votes agree within [`CONSENSUS_SPREAD`].
    pub consensus: bool,
}

impl VoteStats {
    /// Stats for a round with no numeric votes.
    pub fn absent() -> Self {
        Self {
            average: None,
            median: None,
            consensus: false,
        }
    }
}

/// Computes statistics for a set of card values.
///
/// Pure and stateless: the same inputs always produce the same stats.
pub fn calculate<'a, I>(values: I) -> VoteStats
where
    I: IntoIterator<Item = &'a CardValue>,
{
    let mut numeric: Vec<f64> = values
        .into_iter()
        .filter_map(CardValue::as_numeric)
        .collect();

    if numeric.is_empty() {
        return VoteStats::absent();
    }

    numeric.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = numeric.len();
    let sum: f64 = numeric.iter().sum();
    let average = sum / count as f64;

    let median = if count % 2 == 1 {
        numeric[count / 2]
    } else {
        (numeric[count / 2 - 1] + numeric[count / 2]) / 2.0
    };

    let spread = numeric[count - 1] - numeric[0];

    VoteStats {
        average: Some(average),
        median: Some(median),
        consensus: spread < CONSENSUS_SPREAD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cards(tokens: &[&str]) -> Vec<CardValue> {
        tokens.iter().map(|t| CardValue::new(*t).unwrap()).collect()
    }

    #[test]
    fn unanimous_votes_reach_consensus() {
        let votes = cards(&["5", "5", "5"]);
        let stats = calculate(&votes);

        assert!(stats.consensus);
        assert_eq!(stats.average, Some(5.0));
        assert_eq!(stats.median, Some(5.0));
    }

    #[test]
    fn wide_spread_has_no_consensus() {
        let votes = cards(&["1", "5", "13"]);
        let stats = calculate(&votes);

        assert!(!stats.consensus);
    }

    #[test]
    fn spread_exactly_at_threshold_is_not_consensus() {
        // Strict comparator: spread of 2.0 fails, but average and median hold.
        let votes = cards(&["3", "5"]);
        let stats = calculate(&votes);

        assert!(!stats.consensus);
        assert_eq!(stats.average, Some(4.0));
        assert_eq!(stats.median, Some(4.0));
    }

    #[test]
    fn spread_just_under_threshold_is_consensus() {
        let votes = cards(&["3", "4"]);
        let stats = calculate(&votes);

        assert!(stats.consensus);
    }

    #[test]
    fn special_tokens_are_excluded_from_statistics() {
        let votes = cards(&["8", "?", "8", "∞"]);
        let stats = calculate(&votes);

        assert!(stats.consensus);
        assert_eq!(stats.average, Some(8.0));
        assert_eq!(stats.median, Some(8.0));
    }

    #[test]
    fn no_numeric_votes_means_no_consensus_and_null_stats() {
        let votes = cards(&["?", "☕"]);
        let stats = calculate(&votes);

        assert!(!stats.consensus);
        assert_eq!(stats.average, None);
        assert_eq!(stats.median, None);
    }

    #[test]
    fn empty_vote_set_yields_absent_stats() {
        let stats = calculate(&[]);
        assert_eq!(stats, VoteStats::absent());
    }

    #[test]
    fn median_of_even_count_averages_middle_pair() {
        let votes = cards(&["1", "2", "8", "13"]);
        let stats = calculate(&votes);

        assert_eq!(stats.median, Some(5.0));
    }

    #[test]
    fn single_numeric_vote_is_consensus() {
        let votes = cards(&["13"]);
        let stats = calculate(&votes);

        assert!(stats.consensus);
        assert_eq!(stats.average, Some(13.0));
        assert_eq!(stats.median, Some(13.0));
    }

    proptest! {
        #[test]
        fn median_lies_between_min_and_max(values in proptest::collection::vec(0u32..100, 1..20)) {
            let tokens: Vec<CardValue> = values
                .iter()
                .map(|v| CardValue::new(v.to_string()).unwrap())
                .collect();
            let stats = calculate(&tokens);

            let min = *values.iter().min().unwrap() as f64;
            let max = *values.iter().max().unwrap() as f64;
            let median = stats.median.unwrap();

            prop_assert!(median >= min && median <= max);
        }

        #[test]
        fn consensus_matches_strict_spread_rule(values in proptest::collection::vec(0u32..100, 1..20)) {
            let tokens: Vec<CardValue> = values
                .iter()
                .map(|v| CardValue::new(v.to_string()).unwrap())
                .collect();
            let stats = calculate(&tokens);

            let min = *values.iter().min().unwrap() as f64;
            let max = *values.iter().max().unwrap() as f64;

            prop_assert_eq!(stats.consensus, (max - min) < CONSENSUS_SPREAD);
        }

        #[test]
        fn non_numeric_tokens_never_change_numeric_stats(values in proptest::collection::vec(0u32..100, 1..10)) {
            let mut tokens: Vec<CardValue> = values
                .iter()
                .map(|v| CardValue::new(v.to_string()).unwrap())
                .collect();
            let plain = calculate(&tokens);

            tokens.push(CardValue::new("?").unwrap());
            tokens.push(CardValue::new("∞").unwrap());
            let with_specials = calculate(&tokens);

            prop_assert_eq!(plain, with_specials);
        }
    }
}
