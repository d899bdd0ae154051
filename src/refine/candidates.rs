//! Candidate rule files

use crate::corpus::ProfileField;
use crate::rules::Polarity;
use crate::tokenize::NGram;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A proposed rule for human review
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRule {
    pub ngram: NGram,
    pub polarity: Polarity,
    /// Field the n-gram was counted in; `None` proposes an unscoped rule
    pub field: Option<ProfileField>,
    pub score: f64,
    pub rationale: String,
}

/// Header of candidate files; also a valid rule-file header
pub const CANDIDATE_HEADER: [&str; 5] = ["ngram", "polarity", "field", "score", "rationale"];

/// Write candidates, strongest first as given, scores to 6 decimals
pub fn write_candidates<W: Write>(writer: W, candidates: &[CandidateRule]) -> csv::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CANDIDATE_HEADER)?;
    for candidate in candidates {
        csv_writer.write_record([
            candidate.ngram.to_string(),
            candidate.polarity.to_string(),
            candidate
                .field
                .map(|f| f.as_str().to_string())
                .unwrap_or_default(),
            format!("{:.6}", candidate.score),
            candidate.rationale.clone(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn save_candidates<P: AsRef<Path>>(path: P, candidates: &[CandidateRule]) -> csv::Result<()> {
    let file = File::create(path.as_ref())?;
    write_candidates(file, candidates)
}
