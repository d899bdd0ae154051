//! Ledger of n-grams reviewed in earlier rounds

use crate::corpus::ProfileField;
use crate::rules::{pattern_rows, RuleError};
use crate::tokenize::{NGram, NormalizationPolicy};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// N-grams a reviewer has already seen in earlier refinement rounds
///
/// Read from prior candidate files, rule files or plain n-gram lists. Any
/// file with an `ngram` or `pattern` column (or the legacy token columns)
/// works; polarity is ignored and an optional `field` column scopes the
/// entry. An unscoped entry covers every field. Refinement reads the ledger
/// but never writes to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenCandidates {
    ngrams: BTreeMap<NGram, BTreeSet<Option<ProfileField>>>,
}

impl SeenCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an unscoped n-gram
    pub fn insert(&mut self, ngram: NGram) -> bool {
        self.insert_in(None, ngram)
    }

    pub fn insert_in(&mut self, field: Option<ProfileField>, ngram: NGram) -> bool {
        self.ngrams.entry(ngram).or_default().insert(field)
    }

    /// Seen in any field
    pub fn contains(&self, ngram: &NGram) -> bool {
        self.ngrams.contains_key(ngram)
    }

    /// Seen with a scope overlapping `field`
    pub fn contains_in(&self, field: Option<ProfileField>, ngram: &NGram) -> bool {
        match (field, self.ngrams.get(ngram)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(_), Some(scopes)) => scopes.contains(&None) || scopes.contains(&field),
        }
    }

    /// Number of (field, n-gram) entries
    pub fn len(&self) -> usize {
        self.ngrams.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ngrams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<ProfileField>, &NGram)> {
        self.ngrams
            .iter()
            .flat_map(|(ngram, scopes)| scopes.iter().map(move |field| (*field, ngram)))
    }

    /// Add every pattern in a CSV reader, normalized with `policy`
    pub fn extend_from_reader<R: Read>(
        &mut self,
        reader: R,
        policy: &NormalizationPolicy,
    ) -> Result<usize, RuleError> {
        let before = self.len();
        for (field, cell) in pattern_rows(reader)? {
            let tokens = policy.normalize(&cell);
            if !tokens.is_empty() {
                self.insert_in(field, NGram::new(tokens));
            }
        }
        Ok(self.len() - before)
    }

    pub fn extend_from_path<P: AsRef<Path>>(
        &mut self,
        path: P,
        policy: &NormalizationPolicy,
    ) -> Result<usize, RuleError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let added = self.extend_from_reader(file, policy)?;
        info!("Ledger: {} new n-grams from {}", added, path.display());
        Ok(added)
    }

    /// Build a ledger from several files
    pub fn from_paths<P: AsRef<Path>>(
        paths: &[P],
        policy: &NormalizationPolicy,
    ) -> Result<Self, RuleError> {
        let mut seen = Self::new();
        for path in paths {
            seen.extend_from_path(path, policy)?;
        }
        Ok(seen)
    }
}

impl FromIterator<NGram> for SeenCandidates {
    fn from_iter<I: IntoIterator<Item = NGram>>(iter: I) -> Self {
        let mut seen = Self::new();
        for ngram in iter {
            seen.insert(ngram);
        }
        seen
    }
}
