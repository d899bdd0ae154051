//! Blind QA sampling and concordance
//!
//! A QA sample is a CSV of distinct profile texts for human labelling. The
//! machine verdict travels with each row, hidden in bit 16 of a random
//! 64-bit number, so labellers are not influenced by it while
//! [`concordance`] can still recover it afterwards. Concordance is reported
//! weighted by profiles and by tweets.

use crate::corpus::{Corpus, CorpusError};
use crate::stats::Verdicts;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Bit carrying the machine verdict in `obfuscated_match`
pub const VERDICT_BIT: u64 = 1 << 16;

#[derive(Error, Debug)]
pub enum QaError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("Failed to access QA file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid QA CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("QA row {row}: obfuscated_match '{value}' is not a hex number")]
    BadVerdict { row: usize, value: String },
}

pub type Result<T> = std::result::Result<T, QaError>;

/// How QA groups are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Sampling {
    /// Half matched, half unmatched
    #[default]
    ClassStratified,
    /// Uniform over all distinct profile texts
    Uniform,
}

/// One row of a QA sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRow {
    pub name: String,
    pub description: String,
    pub location: String,
    /// Profiles sharing this exact name, description and location
    pub unique_profiles: u64,
    /// Tweets collected across those profiles
    #[serde(default)]
    pub tweet_count: u64,
    pub obfuscated_match: String,
    /// Filled in by the labeller; any non-blank value means "in population"
    #[serde(default)]
    pub human_label: String,
}

impl QaRow {
    pub fn human_match(&self) -> bool {
        !self.human_label.trim().is_empty()
    }
}

pub fn obfuscate<R: Rng>(matched: bool, rng: &mut R) -> String {
    let noise: u64 = rng.gen();
    let value = if matched {
        noise | VERDICT_BIT
    } else {
        noise & !VERDICT_BIT
    };
    format!("{:#x}", value)
}

/// Recover the machine verdict; accepts the value with or without `0x`
pub fn deobfuscate(value: &str) -> Option<bool> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16)
        .ok()
        .map(|v| v & VERDICT_BIT != 0)
}

type GroupKey = (String, String, String);

#[derive(Debug, Clone, Copy, Default)]
struct Group {
    profiles: u64,
    tweets: u64,
    matched: bool,
}

/// Rows drawn for labelling plus the number of malformed profiles skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QaSample {
    pub rows: Vec<QaRow>,
    pub skipped: usize,
}

/// Draw a shuffled QA sample of distinct profile texts
///
/// Profiles are grouped by identical (name, description, location); a group
/// is matched when any of its profiles is, and carries the summed tweet
/// count. `count` is the number of groups to draw; fewer are returned when
/// the corpus has fewer. The same corpus, verdicts and seed always give the
/// same sample.
pub fn qa_sample(
    corpus: &dyn Corpus,
    verdicts: &Verdicts,
    count: usize,
    seed: u64,
    sampling: Sampling,
) -> Result<QaSample> {
    let mut groups: BTreeMap<GroupKey, Group> = BTreeMap::new();
    let mut skipped = 0;
    for item in corpus.profiles()? {
        let profile = match item {
            Ok(profile) => profile,
            Err(malformed) => {
                debug!("Skipping malformed profile at {}", malformed);
                skipped += 1;
                continue;
            }
        };
        let matched = verdicts.get(&profile.id).copied().unwrap_or(false);
        let group = groups.entry(profile.display_key()).or_default();
        group.profiles += 1;
        group.tweets += profile.tweet_count;
        group.matched |= matched;
    }
    if skipped > 0 {
        warn!("Skipped {} malformed profiles while drawing the QA sample", skipped);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let all: Vec<(&GroupKey, &Group)> = groups.iter().collect();

    let mut picked: Vec<(&GroupKey, &Group)> = match sampling {
        Sampling::ClassStratified => {
            let (matched, unmatched): (Vec<_>, Vec<_>) =
                all.iter().copied().partition(|(_, g)| g.matched);
            let half = count / 2;
            if matched.len() < half || unmatched.len() < half {
                warn!(
                    "QA sample short: wanted {} per class, have {} matched and {} unmatched",
                    half,
                    matched.len(),
                    unmatched.len()
                );
            }
            matched
                .choose_multiple(&mut rng, half)
                .chain(unmatched.choose_multiple(&mut rng, half))
                .copied()
                .collect()
        }
        Sampling::Uniform => all.choose_multiple(&mut rng, count).copied().collect(),
    };
    picked.shuffle(&mut rng);

    let rows: Vec<QaRow> = picked
        .into_iter()
        .map(|((name, description, location), group)| QaRow {
            name: name.clone(),
            description: description.clone(),
            location: location.clone(),
            unique_profiles: group.profiles,
            tweet_count: group.tweets,
            obfuscated_match: obfuscate(group.matched, &mut rng),
            human_label: String::new(),
        })
        .collect();

    info!("Drew {} QA rows from {} distinct profiles", rows.len(), groups.len());
    Ok(QaSample { rows, skipped })
}

pub fn write_sample<W: Write>(writer: W, rows: &[QaRow]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn save_sample<P: AsRef<Path>>(path: P, rows: &[QaRow]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| QaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_sample(file, rows)
}

type ConcordanceTable = BTreeMap<(bool, bool), u64>;

fn cell(table: &ConcordanceTable, human: bool, machine: bool) -> u64 {
    table.get(&(human, machine)).copied().unwrap_or(0)
}

fn agreement(table: &ConcordanceTable) -> f64 {
    let total: u64 = table.values().sum();
    if total == 0 {
        return 0.0;
    }
    (cell(table, true, true) + cell(table, false, false)) as f64 / total as f64
}

/// Human vs machine agreement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Concordance {
    /// `(human, machine)` -> profiles
    pub counts: ConcordanceTable,
    /// `(human, machine)` -> tweets
    pub weighted_counts: ConcordanceTable,
}

impl Concordance {
    pub fn get(&self, human: bool, machine: bool) -> u64 {
        cell(&self.counts, human, machine)
    }

    pub fn get_weighted(&self, human: bool, machine: bool) -> u64 {
        cell(&self.weighted_counts, human, machine)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn weighted_total(&self) -> u64 {
        self.weighted_counts.values().sum()
    }

    /// Fraction of profiles where human and machine agree
    pub fn agreement(&self) -> f64 {
        agreement(&self.counts)
    }

    /// Fraction of tweets where human and machine agree
    pub fn weighted_agreement(&self) -> f64 {
        agreement(&self.weighted_counts)
    }
}

impl fmt::Display for Concordance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "human/machine  profiles  tweets")?;
        for human in [false, true] {
            for machine in [false, true] {
                writeln!(
                    f,
                    "{:<5}/{:<7}  {:<8}  {}",
                    human,
                    machine,
                    self.get(human, machine),
                    self.get_weighted(human, machine)
                )?;
            }
        }
        writeln!(f, "agreement: {:.1}%", self.agreement() * 100.0)?;
        writeln!(
            f,
            "tweet-weighted agreement: {:.1}%",
            self.weighted_agreement() * 100.0
        )
    }
}

/// Tally a labelled QA sheet
pub fn concordance<R: Read>(reader: R) -> Result<Concordance> {
    let mut result = Concordance::default();
    let mut csv_reader = csv::Reader::from_reader(reader);
    for (idx, row) in csv_reader.deserialize().enumerate() {
        let row: QaRow = row?;
        let machine = deobfuscate(&row.obfuscated_match).ok_or_else(|| QaError::BadVerdict {
            row: idx + 2,
            value: row.obfuscated_match.clone(),
        })?;
        let key = (row.human_match(), machine);
        *result.counts.entry(key).or_insert(0) += row.unique_profiles;
        *result.weighted_counts.entry(key).or_insert(0) += row.tweet_count;
    }
    Ok(result)
}

pub fn concordance_from_path<P: AsRef<Path>>(path: P) -> Result<Concordance> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| QaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    concordance(file)
}
