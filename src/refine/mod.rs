//! Rule refinement
//!
//! Turns n-gram statistics into a ranked list of candidate include rules
//! for human review. Refinement only proposes: the rule set and the
//! previously-seen ledger are read, never modified. Statistics counted per
//! field yield candidates scoped to that field.
//!
//! # Example
//! ```
//! use std::collections::HashMap;
//! use twittersphere::corpus::MemoryCorpus;
//! use twittersphere::refine::{refine, RefineConfig, SeenCandidates};
//! use twittersphere::rules::RuleSet;
//! use twittersphere::stats::{compute_ngram_stats, StatsOptions};
//! use twittersphere::tokenize::NormalizationPolicy;
//!
//! let corpus = MemoryCorpus::from_texts([
//!     ("1", "solar and renewable energy"),
//!     ("2", "wind renewable energy"),
//!     ("3", "renewable energy jobs"),
//!     ("4", "renewable energy stocks"),
//! ]);
//! let verdicts: HashMap<String, bool> =
//!     [("1", true), ("2", true), ("3", true)].map(|(id, m)| (id.to_string(), m)).into();
//! let rules = RuleSet::new("energy", NormalizationPolicy::default());
//! let stats = compute_ngram_stats(&corpus, &verdicts, &StatsOptions::default()).unwrap();
//!
//! let candidates = refine(&rules, &stats, &SeenCandidates::new(), &RefineConfig::default()).unwrap();
//! assert!(candidates.iter().any(|c| c.ngram.to_string() == "renewable energy"));
//! ```

mod candidates;
mod ledger;

pub use candidates::{save_candidates, write_candidates, CandidateRule, CANDIDATE_HEADER};
pub use ledger::SeenCandidates;

use crate::corpus::ProfileField;
use crate::rules::{Polarity, Rule, RulePattern, RuleSet};
use crate::stats::{NGramStat, ScoreKind, StatsReport};
use crate::tokenize::NGram;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefineError {
    /// Proposed twice, or proposed although already a rule or already seen
    #[error("Candidate '{0}' proposed more than once or already known")]
    DuplicateCandidate(NGram),
}

/// Refinement settings
///
/// # Example
/// ```
/// use twittersphere::refine::RefineConfig;
///
/// let config = RefineConfig::default();
/// assert_eq!(config.min_support, 2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Minimum number of matched profiles containing the n-gram
    pub min_support: u64,

    /// Keep only the strongest N candidates; `None` keeps all
    pub max_candidates: Option<usize>,

    /// Association score used for ranking
    pub score: ScoreKind,

    /// Drop n-grams that contain the pattern of an include rule covering
    /// their field. Every profile they occur in is already matched.
    pub skip_subsumed: bool,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            min_support: 2,
            max_candidates: Some(100),
            score: ScoreKind::LogOdds,
            skip_subsumed: true,
        }
    }
}

impl RefineConfig {
    /// Few, well-supported candidates
    pub fn strict() -> Self {
        Self {
            min_support: 5,
            max_candidates: Some(25),
            ..Self::default()
        }
    }

    /// Everything with any support, including n-grams that extend rules
    pub fn exploratory() -> Self {
        Self {
            min_support: 1,
            max_candidates: None,
            skip_subsumed: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_support == 0 {
            return Err("min_support must be >= 1".to_string());
        }
        if self.max_candidates == Some(0) {
            return Err("max_candidates must be >= 1 when set".to_string());
        }
        Ok(())
    }
}

/// Pattern occurs inside the n-gram (contiguously for words and phrases)
fn pattern_within(pattern: &RulePattern, ngram: &NGram) -> bool {
    match pattern {
        RulePattern::Word(token) => ngram.tokens().contains(token),
        RulePattern::Phrase(phrase) => ngram.contains_run(phrase.tokens()),
        RulePattern::TokenSet(tokens) => tokens.iter().all(|t| ngram.tokens().contains(t)),
    }
}

fn rationale(stat: &NGramStat, score_name: &str, score: f64) -> String {
    format!(
        "matched {}/{}, unmatched {}/{}, {} {:.6}",
        stat.count_in_matched,
        stat.total_matched,
        stat.count_in_unmatched,
        stat.total_unmatched,
        score_name,
        score
    )
}

/// Rank n-grams as candidate include rules
///
/// Drops n-grams already in the rule file (as rules or unlabelled rows),
/// already in `seen`, subsumed by an include rule (when configured) or
/// below `min_support`. Rule and ledger entries only count when their field
/// scope overlaps the n-gram's; token-set rules compare as sets. The rest are
/// sorted by score, strongest first, ties broken by token order then field.
pub fn refine(
    ruleset: &RuleSet,
    stats: &StatsReport,
    seen: &SeenCandidates,
    config: &RefineConfig,
) -> Result<Vec<CandidateRule>, RefineError> {
    let scorer = config.score.scorer();
    let subsuming: Vec<&Rule> = if config.skip_subsumed {
        ruleset.includes().collect()
    } else {
        Vec::new()
    };
    // an unscoped candidate is only subsumed by an unscoped rule
    let is_subsumed = |stat: &NGramStat| {
        subsuming.iter().any(|r| {
            (r.field.is_none() || r.field == stat.field) && pattern_within(&r.pattern, &stat.ngram)
        })
    };
    let is_known = |field: Option<ProfileField>, ngram: &NGram| {
        ruleset.covers(field, ngram) || seen.contains_in(field, ngram)
    };

    let mut candidates: Vec<CandidateRule> = stats
        .stats
        .iter()
        .filter(|s| s.count_in_matched >= config.min_support)
        .filter(|s| !is_known(s.field, &s.ngram))
        .filter(|s| !is_subsumed(*s))
        .map(|s| {
            let score = scorer.score(s);
            CandidateRule {
                ngram: s.ngram.clone(),
                polarity: Polarity::Include,
                field: s.field,
                score,
                rationale: rationale(s, scorer.name(), score),
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.ngram.cmp(&b.ngram))
            .then_with(|| a.field.cmp(&b.field))
    });
    if let Some(max) = config.max_candidates {
        candidates.truncate(max);
    }

    let mut proposed = BTreeSet::new();
    for candidate in &candidates {
        if is_known(candidate.field, &candidate.ngram)
            || !proposed.insert((candidate.field, &candidate.ngram))
        {
            return Err(RefineError::DuplicateCandidate(candidate.ngram.clone()));
        }
        debug!("candidate '{}': {}", candidate.ngram, candidate.rationale);
    }

    info!(
        "Proposed {} candidates for '{}' from {} n-grams",
        candidates.len(),
        ruleset.name(),
        stats.stats.len()
    );
    Ok(candidates)
}
