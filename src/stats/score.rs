//! Association scores for ranking candidate n-grams
//!
//! Any score used for ranking must never decrease when an n-gram's matched
//! count grows while its unmatched count stays fixed. Both scores here add
//! ½ to every cell so that zero counts stay finite.

use super::NGramStat;
use serde::{Deserialize, Serialize};

/// Scores how strongly an n-gram is over-represented in the matched
/// population relative to the unmatched one
pub trait AssociationScore: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, stat: &NGramStat) -> f64;
}

/// Smoothed log-odds ratio
///
/// `ln((a+½)/(A−a+½)) − ln((b+½)/(B−b+½))` where `a` of `A` matched
/// profiles and `b` of `B` unmatched profiles contain the n-gram.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOddsRatio;

impl AssociationScore for LogOddsRatio {
    fn name(&self) -> &'static str {
        "log-odds"
    }

    fn score(&self, stat: &NGramStat) -> f64 {
        let a = stat.count_in_matched as f64;
        let not_a = stat.total_matched.saturating_sub(stat.count_in_matched) as f64;
        let b = stat.count_in_unmatched as f64;
        let not_b = stat.total_unmatched.saturating_sub(stat.count_in_unmatched) as f64;

        ((a + 0.5) / (not_a + 0.5)).ln() - ((b + 0.5) / (not_b + 0.5)).ln()
    }
}

/// Ratio of smoothed relative document frequencies
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeFrequency;

impl AssociationScore for RelativeFrequency {
    fn name(&self) -> &'static str {
        "relative-frequency"
    }

    fn score(&self, stat: &NGramStat) -> f64 {
        let matched_rate =
            (stat.count_in_matched as f64 + 0.5) / (stat.total_matched as f64 + 1.0);
        let unmatched_rate =
            (stat.count_in_unmatched as f64 + 0.5) / (stat.total_unmatched as f64 + 1.0);
        matched_rate / unmatched_rate
    }
}

/// Configurable choice of score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreKind {
    #[default]
    LogOdds,
    RelativeFrequency,
}

impl ScoreKind {
    pub fn scorer(&self) -> Box<dyn AssociationScore> {
        match self {
            ScoreKind::LogOdds => Box::new(LogOddsRatio),
            ScoreKind::RelativeFrequency => Box::new(RelativeFrequency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::NGram;

    fn stat(a: u64, total_a: u64, b: u64, total_b: u64) -> NGramStat {
        NGramStat {
            ngram: NGram::from_joined("x"),
            field: None,
            count_in_matched: a,
            count_in_unmatched: b,
            total_matched: total_a,
            total_unmatched: total_b,
        }
    }

    #[test]
    fn test_log_odds_sign() {
        let over = LogOddsRatio.score(&stat(8, 10, 1, 10));
        let under = LogOddsRatio.score(&stat(1, 10, 8, 10));
        let even = LogOddsRatio.score(&stat(5, 10, 5, 10));
        assert!(over > 0.0);
        assert!(under < 0.0);
        assert!(even.abs() < 1e-12);
    }

    #[test]
    fn test_scores_finite_on_empty_buckets() {
        for kind in [ScoreKind::LogOdds, ScoreKind::RelativeFrequency] {
            let scorer = kind.scorer();
            assert!(scorer.score(&stat(0, 0, 0, 0)).is_finite());
            assert!(scorer.score(&stat(3, 3, 0, 0)).is_finite());
        }
    }

    #[test]
    fn test_monotonic_in_matched_count() {
        for kind in [ScoreKind::LogOdds, ScoreKind::RelativeFrequency] {
            let scorer = kind.scorer();
            let mut previous = f64::NEG_INFINITY;
            for a in 0..=20 {
                let s = scorer.score(&stat(a, 20, 4, 50));
                assert!(s > previous, "{} not increasing at a={}", scorer.name(), a);
                previous = s;
            }
        }
    }

    #[test]
    fn test_score_kind_names() {
        assert_eq!(ScoreKind::LogOdds.scorer().name(), "log-odds");
        assert_eq!(
            ScoreKind::RelativeFrequency.scorer().name(),
            "relative-frequency"
        );
    }
}
