//! Fingerprinted n-gram statistics cache
//!
//! Statistics are a pure function of the corpus texts, the verdicts, the
//! n-gram range, the fields (and whether they are counted apart) and the
//! normalization policy. A
//! [`CorpusFingerprint`] hashes all of them; a cached report is reused only
//! when the fingerprint is identical. The cache is an ordinary value owned
//! by the caller and persisted as JSON.

use super::{compute_ngram_stats_auto, StatsOptions, StatsReport, Verdicts};
use crate::corpus::{Corpus, CorpusError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to access stats cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid stats cache format: {0}")]
    Format(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Hex SHA-256 over everything the statistics depend on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorpusFingerprint(String);

// Length-prefixed so adjacent values cannot run together
fn put(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl CorpusFingerprint {
    /// One pass over the corpus, in corpus order
    pub fn compute(
        corpus: &dyn Corpus,
        verdicts: &Verdicts,
        options: &StatsOptions,
    ) -> std::result::Result<Self, CorpusError> {
        let mut hasher = Sha256::new();
        put(&mut hasher, options.policy.policy_tag().as_bytes());
        hasher.update((options.min_n as u64).to_le_bytes());
        hasher.update((options.max_n as u64).to_le_bytes());
        for field in &options.fields {
            put(&mut hasher, field.as_str().as_bytes());
        }
        hasher.update([u8::from(options.per_field)]);

        for item in corpus.profiles()? {
            match item {
                Ok(profile) => {
                    hasher.update([b'P']);
                    put(&mut hasher, profile.id.as_bytes());
                    for &field in &options.fields {
                        put(&mut hasher, profile.field_text(field).as_bytes());
                    }
                    let matched = verdicts.get(&profile.id).copied().unwrap_or(false);
                    hasher.update([u8::from(matched)]);
                }
                Err(malformed) => {
                    hasher.update([b'M']);
                    hasher.update((malformed.line as u64).to_le_bytes());
                }
            }
        }

        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorpusFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of checking a cache against the current corpus
#[derive(Debug, PartialEq, Eq)]
pub enum CacheLookup<'a> {
    Hit(&'a StatsReport),
    /// Normalization policy (or its version) differs from the cached one
    PolicyChanged { cached: String, current: String },
    CorpusChanged,
}

/// Statistics report stored with the fingerprint it was computed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsCache {
    pub fingerprint: CorpusFingerprint,
    pub policy_tag: String,
    pub report: StatsReport,
}

impl StatsCache {
    pub fn new(fingerprint: CorpusFingerprint, options: &StatsOptions, report: StatsReport) -> Self {
        Self {
            fingerprint,
            policy_tag: options.policy.policy_tag(),
            report,
        }
    }

    pub fn lookup(&self, fingerprint: &CorpusFingerprint, options: &StatsOptions) -> CacheLookup<'_> {
        let current = options.policy.policy_tag();
        if self.policy_tag != current {
            return CacheLookup::PolicyChanged {
                cached: self.policy_tag.clone(),
                current,
            };
        }
        if &self.fingerprint != fingerprint {
            return CacheLookup::CorpusChanged;
        }
        CacheLookup::Hit(&self.report)
    }

    /// Load a cache file; `Ok(None)` when the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;
        fs::write(path, json).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Reuse `cached` when its fingerprint matches, otherwise recompute
///
/// Returns the cache to keep and whether it was recomputed.
pub fn cached_ngram_stats(
    corpus: &dyn Corpus,
    verdicts: &Verdicts,
    options: &StatsOptions,
    cached: Option<StatsCache>,
) -> std::result::Result<(StatsCache, bool), CorpusError> {
    let fingerprint = CorpusFingerprint::compute(corpus, verdicts, options)?;

    if let Some(cache) = cached {
        match cache.lookup(&fingerprint, options) {
            CacheLookup::Hit(_) => {
                info!("Stats cache hit ({})", fingerprint);
                return Ok((cache, false));
            }
            CacheLookup::PolicyChanged { cached, current } => {
                info!(
                    "Normalization policy changed ({} -> {}), recomputing n-gram stats",
                    cached, current
                );
            }
            CacheLookup::CorpusChanged => {
                info!("Corpus or verdicts changed, recomputing n-gram stats");
            }
        }
    }

    let report = compute_ngram_stats_auto(corpus, verdicts, options)?;
    Ok((StatsCache::new(fingerprint, options, report), true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemoryCorpus;
    use crate::tokenize::NormalizationPolicy;

    fn corpus() -> MemoryCorpus {
        MemoryCorpus::from_texts([("1", "solar power"), ("2", "wind farm")])
    }

    fn verdicts() -> Verdicts {
        Verdicts::from([("1".to_string(), true)])
    }

    #[test]
    fn test_fingerprint_stable() {
        let options = StatsOptions::default();
        let a = CorpusFingerprint::compute(&corpus(), &verdicts(), &options).unwrap();
        let b = CorpusFingerprint::compute(&corpus(), &verdicts(), &options).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_sensitive_to_text_and_verdicts() {
        let options = StatsOptions::default();
        let base = CorpusFingerprint::compute(&corpus(), &verdicts(), &options).unwrap();

        let edited = MemoryCorpus::from_texts([("1", "solar power"), ("2", "wind farms")]);
        let text_changed = CorpusFingerprint::compute(&edited, &verdicts(), &options).unwrap();
        assert_ne!(base, text_changed);

        let flipped = Verdicts::from([("2".to_string(), true)]);
        let verdict_changed = CorpusFingerprint::compute(&corpus(), &flipped, &options).unwrap();
        assert_ne!(base, verdict_changed);

        let per_field = StatsOptions {
            per_field: true,
            ..StatsOptions::default()
        };
        let mode_changed = CorpusFingerprint::compute(&corpus(), &verdicts(), &per_field).unwrap();
        assert_ne!(base, mode_changed);
    }

    #[test]
    fn test_lookup_outcomes() {
        let options = StatsOptions::default();
        let (cache, recomputed) = cached_ngram_stats(&corpus(), &verdicts(), &options, None).unwrap();
        assert!(recomputed);

        let fp = CorpusFingerprint::compute(&corpus(), &verdicts(), &options).unwrap();
        assert_eq!(cache.lookup(&fp, &options), CacheLookup::Hit(&cache.report));

        let edited = MemoryCorpus::from_texts([("1", "solar"), ("2", "wind farm")]);
        let fp_edited = CorpusFingerprint::compute(&edited, &verdicts(), &options).unwrap();
        assert_eq!(cache.lookup(&fp_edited, &options), CacheLookup::CorpusChanged);

        let stripped = StatsOptions {
            policy: NormalizationPolicy {
                strip_diacritics: true,
            },
            ..StatsOptions::default()
        };
        assert!(matches!(
            cache.lookup(&fp, &stripped),
            CacheLookup::PolicyChanged { .. }
        ));
    }

    #[test]
    fn test_cached_stats_reused_on_hit() {
        let options = StatsOptions::default();
        let (first, _) = cached_ngram_stats(&corpus(), &verdicts(), &options, None).unwrap();
        let (second, recomputed) =
            cached_ngram_stats(&corpus(), &verdicts(), &options, Some(first.clone())).unwrap();
        assert!(!recomputed);
        assert_eq!(first, second);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        assert!(StatsCache::load(&path).unwrap().is_none());

        let options = StatsOptions::default();
        let (cache, _) = cached_ngram_stats(&corpus(), &verdicts(), &options, None).unwrap();
        cache.save(&path).unwrap();
        assert_eq!(StatsCache::load(&path).unwrap(), Some(cache));
    }

    #[test]
    fn test_corrupt_cache_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(StatsCache::load(&path), Err(CacheError::Format(_))));
    }
}
