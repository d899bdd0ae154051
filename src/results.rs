//! Match results and their persistence
//!
//! A [`MatchResult`] is keyed by `(ruleset_name, profile_id)`. [`MatchStore`]
//! upserts on that key, so matching the same corpus with the same rule set
//! twice leaves exactly one row per profile.

use crate::rules::RuleId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("Failed to access results file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid results CSV: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ResultsError>;

/// Verdict for one profile under one rule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub profile_id: String,
    pub ruleset_name: String,
    pub matched: bool,
    /// Rule that decided the verdict; `None` when no rule matched
    pub firing_rule_id: Option<u32>,
}

impl MatchResult {
    pub fn firing_rule(&self) -> Option<RuleId> {
        self.firing_rule_id.map(RuleId)
    }
}

/// Destination for match results
pub trait MatchSink {
    fn record(&mut self, result: MatchResult);
}

impl MatchSink for Vec<MatchResult> {
    fn record(&mut self, result: MatchResult) {
        self.push(result);
    }
}

/// In-memory result table with upsert semantics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStore {
    rows: BTreeMap<(String, String), MatchResult>,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the row for `(ruleset_name, profile_id)`
    pub fn upsert(&mut self, result: MatchResult) {
        let key = (result.ruleset_name.clone(), result.profile_id.clone());
        self.rows.insert(key, result);
    }

    /// Drop every row of a rule set before it is re-applied
    pub fn clear_ruleset(&mut self, ruleset_name: &str) -> usize {
        let before = self.rows.len();
        self.rows.retain(|(name, _), _| name != ruleset_name);
        before - self.rows.len()
    }

    pub fn get(&self, ruleset_name: &str, profile_id: &str) -> Option<&MatchResult> {
        self.rows
            .get(&(ruleset_name.to_string(), profile_id.to_string()))
    }

    /// Rows of one rule set, ordered by profile id
    pub fn for_ruleset<'a>(&'a self, ruleset_name: &'a str) -> impl Iterator<Item = &'a MatchResult> {
        self.rows
            .values()
            .filter(move |r| r.ruleset_name == ruleset_name)
    }

    /// Profile id -> matched, for the statistics engine
    pub fn verdicts(&self, ruleset_name: &str) -> HashMap<String, bool> {
        self.for_ruleset(ruleset_name)
            .map(|r| (r.profile_id.clone(), r.matched))
            .collect()
    }

    pub fn ruleset_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rows.keys().map(|(n, _)| n.as_str()).collect();
        names.dedup();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchResult> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read results CSV (`profile_id,ruleset_name,matched,firing_rule_id`)
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut store = Self::new();
        let mut csv_reader = csv::Reader::from_reader(reader);
        for row in csv_reader.deserialize() {
            let result: MatchResult = row?;
            store.upsert(result);
        }
        Ok(store)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for result in self.rows.values() {
            csv_writer.serialize(result)?;
        }
        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Load a results file; a missing file is an empty store
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => Self::read_csv(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(source) => Err(ResultsError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| ResultsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_csv(file)
    }
}

impl MatchSink for MatchStore {
    fn record(&mut self, result: MatchResult) {
        self.upsert(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(profile: &str, ruleset: &str, matched: bool, rule: Option<u32>) -> MatchResult {
        MatchResult {
            profile_id: profile.to_string(),
            ruleset_name: ruleset.to_string(),
            matched,
            firing_rule_id: rule,
        }
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let mut store = MatchStore::new();
        store.upsert(result("1", "climate", false, None));
        store.upsert(result("1", "climate", true, Some(2)));
        store.upsert(result("1", "other", false, None));
        assert_eq!(store.len(), 2);
        assert!(store.get("climate", "1").unwrap().matched);
    }

    #[test]
    fn test_clear_ruleset() {
        let mut store = MatchStore::new();
        store.upsert(result("1", "a", true, Some(1)));
        store.upsert(result("2", "a", false, None));
        store.upsert(result("1", "b", true, Some(1)));
        assert_eq!(store.clear_ruleset("a"), 2);
        assert_eq!(store.ruleset_names(), vec!["b"]);
    }

    #[test]
    fn test_verdicts() {
        let mut store = MatchStore::new();
        store.upsert(result("1", "a", true, Some(1)));
        store.upsert(result("2", "a", false, Some(3)));
        let verdicts = store.verdicts("a");
        assert_eq!(verdicts.get("1"), Some(&true));
        assert_eq!(verdicts.get("2"), Some(&false));
        assert!(store.verdicts("missing").is_empty());
    }

    #[test]
    fn test_csv_round_trip_preserves_rows() {
        let mut store = MatchStore::new();
        store.upsert(result("10", "climate", true, Some(4)));
        store.upsert(result("11", "climate", false, None));

        let mut buf = Vec::new();
        store.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("profile_id,ruleset_name,matched,firing_rule_id\n"));
        assert!(text.contains("11,climate,false,\n"));

        let loaded = MatchStore::read_csv(buf.as_slice()).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatchStore::load(dir.path().join("none.csv")).unwrap();
        assert!(store.is_empty());
    }
}
