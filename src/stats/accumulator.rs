//! Mergeable n-gram counters

use crate::corpus::ProfileField;
use crate::tokenize::NGram;
use fnv::FnvHashMap;

use super::NGramStat;

/// What one statistic is counted under: an n-gram, optionally per field
pub type StatKey = (Option<ProfileField>, NGram);

/// Profile counts for one n-gram, split by population
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub matched: u64,
    pub unmatched: u64,
}

/// Mergeable n-gram counter
///
/// Memory grows with the number of distinct n-grams, not with corpus size.
/// [`NGramAccumulator::merge`] is a plain sum, so partial accumulators built
/// over any partition of the corpus combine, in any order, into exactly the
/// accumulator of a single sequential pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NGramAccumulator {
    counts: FnvHashMap<StatKey, BucketCounts>,
    total_matched: u64,
    total_unmatched: u64,
}

impl NGramAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one profile. `ngrams` should be the profile's distinct n-grams;
    /// counts are profile frequencies.
    pub fn add_profile<I>(&mut self, matched: bool, ngrams: I)
    where
        I: IntoIterator<Item = NGram>,
    {
        self.add_profile_keys(matched, ngrams.into_iter().map(|ngram| (None, ngram)));
    }

    /// Count one profile under distinct (field, n-gram) keys
    pub fn add_profile_keys<I>(&mut self, matched: bool, keys: I)
    where
        I: IntoIterator<Item = StatKey>,
    {
        if matched {
            self.total_matched += 1;
        } else {
            self.total_unmatched += 1;
        }

        for key in keys {
            let entry = self.counts.entry(key).or_default();
            if matched {
                entry.matched += 1;
            } else {
                entry.unmatched += 1;
            }
        }
    }

    /// Fold another accumulator into this one
    pub fn merge(&mut self, other: NGramAccumulator) {
        self.total_matched += other.total_matched;
        self.total_unmatched += other.total_unmatched;

        // Iterate the smaller map
        let (mut base, extra) = if self.counts.len() >= other.counts.len() {
            (std::mem::take(&mut self.counts), other.counts)
        } else {
            (other.counts, std::mem::take(&mut self.counts))
        };
        for (key, counts) in extra {
            let entry = base.entry(key).or_default();
            entry.matched += counts.matched;
            entry.unmatched += counts.unmatched;
        }
        self.counts = base;
    }

    pub fn merged(mut self, other: NGramAccumulator) -> Self {
        self.merge(other);
        self
    }

    pub fn get(&self, ngram: &NGram) -> Option<BucketCounts> {
        self.get_in(None, ngram)
    }

    pub fn get_in(&self, field: Option<ProfileField>, ngram: &NGram) -> Option<BucketCounts> {
        self.counts.get(&(field, ngram.clone())).copied()
    }

    pub fn total_matched(&self) -> u64 {
        self.total_matched
    }

    pub fn total_unmatched(&self) -> u64 {
        self.total_unmatched
    }

    pub fn profiles(&self) -> u64 {
        self.total_matched + self.total_unmatched
    }

    pub fn vocabulary_size(&self) -> usize {
        self.counts.len()
    }

    /// Stat records sorted by field, then n-gram
    pub fn finish(self) -> Vec<NGramStat> {
        let total_matched = self.total_matched;
        let total_unmatched = self.total_unmatched;
        let mut stats: Vec<NGramStat> = self
            .counts
            .into_iter()
            .map(|((field, ngram), c)| NGramStat {
                ngram,
                field,
                count_in_matched: c.matched,
                count_in_unmatched: c.unmatched,
                total_matched,
                total_unmatched,
            })
            .collect();
        stats.sort_by(|a, b| (a.field, &a.ngram).cmp(&(b.field, &b.ngram)));
        stats
    }
}
