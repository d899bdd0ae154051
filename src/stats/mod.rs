//! N-gram association statistics
//!
//! Contrasts the matched and unmatched populations of a rule set. Every
//! profile is bucketed by its match verdict (a profile with no verdict is
//! unmatched) and contributes its distinct n-grams, across all configured
//! fields, to that bucket. Counts are profile frequencies.
//!
//! With [`StatsOptions::per_field`] set, n-grams are counted separately for
//! each field, so "brisbane" in a location and "brisbane" in a description
//! are two statistics.
//!
//! # Example
//! ```
//! use std::collections::HashMap;
//! use twittersphere::corpus::MemoryCorpus;
//! use twittersphere::stats::{compute_ngram_stats, StatsOptions};
//! use twittersphere::tokenize::NGram;
//!
//! let corpus = MemoryCorpus::from_texts([("1", "solar power"), ("2", "solar farm")]);
//! let verdicts = HashMap::from([("1".to_string(), true)]);
//! let report = compute_ngram_stats(&corpus, &verdicts, &StatsOptions::default()).unwrap();
//!
//! let solar = report.get(&NGram::from_joined("solar")).unwrap();
//! assert_eq!((solar.count_in_matched, solar.count_in_unmatched), (1, 1));
//! assert_eq!((report.total_matched, report.total_unmatched), (1, 1));
//! ```

mod accumulator;
pub mod cache;
mod score;

pub use accumulator::{BucketCounts, NGramAccumulator, StatKey};
pub use cache::{cached_ngram_stats, CacheError, CacheLookup, CorpusFingerprint, StatsCache};
pub use score::{AssociationScore, LogOddsRatio, RelativeFrequency, ScoreKind};

use crate::corpus::{Corpus, CorpusError, CorpusItem, Profile, ProfileField};
use crate::tokenize::{ngram_set, NGram, NormalizationPolicy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

/// Profile id -> matched
pub type Verdicts = HashMap<String, bool>;

/// Counts for one n-gram over the matched and unmatched populations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NGramStat {
    pub ngram: NGram,
    /// Field the n-gram was counted in; `None` unless counting per field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<ProfileField>,
    pub count_in_matched: u64,
    pub count_in_unmatched: u64,
    pub total_matched: u64,
    pub total_unmatched: u64,
}

/// What n-grams to extract, and from which fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsOptions {
    pub min_n: usize,
    pub max_n: usize,
    pub policy: NormalizationPolicy,
    pub fields: Vec<ProfileField>,
    /// Key statistics by (field, n-gram) instead of n-gram alone
    #[serde(default)]
    pub per_field: bool,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            min_n: 1,
            max_n: 3,
            policy: NormalizationPolicy::default(),
            fields: ProfileField::DEFAULT_FIELDS.to_vec(),
            per_field: false,
        }
    }
}

impl StatsOptions {
    pub fn sizes(&self) -> RangeInclusive<usize> {
        self.min_n..=self.max_n
    }

    /// Distinct n-grams of a profile; each field is windowed on its own
    pub fn profile_ngrams(&self, profile: &Profile) -> BTreeSet<NGram> {
        let mut grams = BTreeSet::new();
        for &field in &self.fields {
            let tokens = self.policy.normalize(profile.field_text(field));
            grams.extend(ngram_set(&tokens, self.sizes()));
        }
        grams
    }

    /// Distinct statistic keys of a profile
    pub fn profile_keys(&self, profile: &Profile) -> BTreeSet<StatKey> {
        if !self.per_field {
            return self
                .profile_ngrams(profile)
                .into_iter()
                .map(|ngram| (None, ngram))
                .collect();
        }
        let mut keys = BTreeSet::new();
        for &field in &self.fields {
            let tokens = self.policy.normalize(profile.field_text(field));
            keys.extend(
                ngram_set(&tokens, self.sizes())
                    .into_iter()
                    .map(|ngram| (Some(field), ngram)),
            );
        }
        keys
    }
}

/// Sorted statistics plus the number of malformed profiles skipped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    pub stats: Vec<NGramStat>,
    pub total_matched: u64,
    pub total_unmatched: u64,
    pub skipped: usize,
}

impl StatsReport {
    fn from_accumulator(acc: NGramAccumulator, skipped: usize) -> Self {
        let total_matched = acc.total_matched();
        let total_unmatched = acc.total_unmatched();
        if total_matched + total_unmatched == 0 {
            warn!("Empty corpus: no profiles to compute n-gram statistics over");
        }
        if skipped > 0 {
            warn!("Skipped {} malformed profiles while counting n-grams", skipped);
        }
        let stats = acc.finish();
        info!(
            "Counted {} distinct n-grams over {} matched / {} unmatched profiles",
            stats.len(),
            total_matched,
            total_unmatched
        );
        Self {
            stats,
            total_matched,
            total_unmatched,
            skipped,
        }
    }

    /// Unscoped statistic for `ngram`
    pub fn get(&self, ngram: &NGram) -> Option<&NGramStat> {
        self.get_in(None, ngram)
    }

    /// Binary search on the stats, sorted by field then n-gram
    pub fn get_in(&self, field: Option<ProfileField>, ngram: &NGram) -> Option<&NGramStat> {
        self.stats
            .binary_search_by(|s| (s.field, &s.ngram).cmp(&(field, ngram)))
            .ok()
            .map(|i| &self.stats[i])
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

fn accumulate(
    acc: &mut NGramAccumulator,
    skipped: &mut usize,
    item: CorpusItem,
    verdicts: &Verdicts,
    options: &StatsOptions,
) {
    match item {
        Ok(profile) => {
            let matched = verdicts.get(&profile.id).copied().unwrap_or(false);
            acc.add_profile_keys(matched, options.profile_keys(&profile));
        }
        Err(malformed) => {
            debug!("Skipping malformed profile at {}", malformed);
            *skipped += 1;
        }
    }
}

/// Single sequential pass over the corpus
pub fn compute_ngram_stats(
    corpus: &dyn Corpus,
    verdicts: &Verdicts,
    options: &StatsOptions,
) -> Result<StatsReport, CorpusError> {
    let mut acc = NGramAccumulator::new();
    let mut skipped = 0;
    for item in corpus.profiles()? {
        accumulate(&mut acc, &mut skipped, item, verdicts, options);
    }
    Ok(StatsReport::from_accumulator(acc, skipped))
}

/// Parallel pass; identical output to [`compute_ngram_stats`]
#[cfg(feature = "parallel")]
pub fn par_compute_ngram_stats(
    corpus: &dyn Corpus,
    verdicts: &Verdicts,
    options: &StatsOptions,
) -> Result<StatsReport, CorpusError> {
    use rayon::iter::{ParallelBridge, ParallelIterator};

    let (acc, skipped) = corpus
        .profiles()?
        .par_bridge()
        .fold(
            || (NGramAccumulator::new(), 0usize),
            |(mut acc, mut skipped), item| {
                accumulate(&mut acc, &mut skipped, item, verdicts, options);
                (acc, skipped)
            },
        )
        .reduce(
            || (NGramAccumulator::new(), 0usize),
            |(a, skipped_a), (b, skipped_b)| (a.merged(b), skipped_a + skipped_b),
        );
    Ok(StatsReport::from_accumulator(acc, skipped))
}

/// Parallel when the `parallel` feature is on, sequential otherwise
pub fn compute_ngram_stats_auto(
    corpus: &dyn Corpus,
    verdicts: &Verdicts,
    options: &StatsOptions,
) -> Result<StatsReport, CorpusError> {
    #[cfg(feature = "parallel")]
    {
        par_compute_ngram_stats(corpus, verdicts, options)
    }
    #[cfg(not(feature = "parallel"))]
    {
        compute_ngram_stats(corpus, verdicts, options)
    }
}
