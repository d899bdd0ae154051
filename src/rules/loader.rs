//! Rule file parsing
//!
//! Rule files are CSV with a header row. Columns, in any order:
//!
//! | column | values |
//! |--------|--------|
//! | `pattern` or `ngram` | word or phrase |
//! | `polarity` | `include`, `exclude`, or blank |
//! | `field` (optional) | `name`, `description`, `location`, `tweets`, or blank |
//! | `match` (optional) | `phrase` (default) or `all` |
//!
//! Older files use `include` (`1`, `-1`, blank) instead of `polarity` and
//! spread the pattern over `first_token`, `second_token`, `third_token`.
//! Candidate files written by refinement load as rule files as-is.

use super::{MatchMode, Polarity, Result, RuleError, RuleSet};
use crate::corpus::ProfileField;
use crate::tokenize::NormalizationPolicy;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const LEGACY_TOKEN_COLUMNS: [&str; 3] = ["first_token", "second_token", "third_token"];

/// Where the pattern text comes from in a row
enum PatternColumns {
    Single(usize),
    Legacy(Vec<usize>),
}

struct Columns {
    pattern: PatternColumns,
    polarity: Option<usize>,
    field: Option<usize>,
    mode: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{FEFF}').to_ascii_lowercase())
            .collect();
        let find = |wanted: &[&str]| names.iter().position(|n| wanted.contains(&n.as_str()));

        let pattern = match find(&["pattern", "ngram"]) {
            Some(idx) => PatternColumns::Single(idx),
            None => {
                let legacy: Vec<usize> = LEGACY_TOKEN_COLUMNS
                    .iter()
                    .filter_map(|c| find(&[c]))
                    .collect();
                if legacy.is_empty() {
                    return Err(RuleError::MissingColumn("pattern".to_string()));
                }
                PatternColumns::Legacy(legacy)
            }
        };

        Ok(Self {
            pattern,
            polarity: find(&["polarity", "include"]),
            field: find(&["field"]),
            mode: find(&["match"]),
        })
    }

    fn field(&self, record: &csv::StringRecord) -> std::result::Result<Option<ProfileField>, String> {
        match self.field.and_then(|i| record.get(i)) {
            Some(cell) if !cell.trim().is_empty() => cell.parse().map(Some),
            _ => Ok(None),
        }
    }

    fn pattern_text(&self, record: &csv::StringRecord) -> String {
        match &self.pattern {
            PatternColumns::Single(idx) => record.get(*idx).unwrap_or("").to_string(),
            PatternColumns::Legacy(indices) => indices
                .iter()
                .filter_map(|i| record.get(*i))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl RuleSet {
    /// Load a rule file; the rule set is named after the file stem
    ///
    /// # Example
    /// ```no_run
    /// use twittersphere::rules::RuleSet;
    /// use twittersphere::tokenize::NormalizationPolicy;
    ///
    /// let rules = RuleSet::from_path("climate.csv", NormalizationPolicy::default())?;
    /// println!("{}: {} rules", rules.name(), rules.len());
    /// # Ok::<(), twittersphere::rules::RuleError>(())
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P, policy: NormalizationPolicy) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let file = File::open(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let ruleset = Self::from_csv_reader(name, file, policy)?;
        info!(
            "Loaded {} rules ({} include, {} exclude, {} unlabelled) from {}",
            ruleset.len(),
            ruleset.includes().count(),
            ruleset.excludes().count(),
            ruleset.unlabelled().len(),
            path.display()
        );
        Ok(ruleset)
    }

    /// Parse rule CSV from any reader. Rows keep their file order.
    pub fn from_csv_reader<R: Read>(
        name: impl Into<String>,
        reader: R,
        policy: NormalizationPolicy,
    ) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Fields)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| RuleError::MalformedRuleRow {
                row: 1,
                reason: e.to_string(),
            })?
            .clone();
        let columns = Columns::from_headers(&headers)?;
        let polarity_column = columns
            .polarity
            .ok_or_else(|| RuleError::MissingColumn("polarity".to_string()))?;

        let mut ruleset = RuleSet::new(name, policy);

        for (idx, record) in csv_reader.records().enumerate() {
            let fallback_row = idx + 2;
            let record = record.map_err(|e| RuleError::MalformedRuleRow {
                row: e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_row),
                reason: e.to_string(),
            })?;
            let row = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(fallback_row);

            let malformed = |reason: String| RuleError::MalformedRuleRow { row, reason };

            let polarity = Polarity::parse_cell(record.get(polarity_column).unwrap_or(""))
                .map_err(malformed)?;

            let field = columns.field(&record).map_err(malformed)?;

            let mode = match columns.mode.and_then(|i| record.get(i)) {
                Some(cell) => cell.parse::<MatchMode>().map_err(malformed)?,
                None => MatchMode::Phrase,
            };

            let pattern = columns.pattern_text(&record);
            debug!("rule row {}: {:?} '{}'", row, polarity, pattern);
            ruleset.push_row(row, polarity, &pattern, field, mode)?;
        }

        Ok(ruleset)
    }
}

/// Field scope and pattern text of every data row, whatever the polarity
///
/// Accepts any file with a pattern column (rule files, candidate files,
/// plain n-gram lists), so previously reviewed n-grams can be collected
/// from all of them. A blank or missing `field` means unscoped.
pub(crate) fn pattern_rows<R: Read>(reader: R) -> Result<Vec<(Option<ProfileField>, String)>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Fields)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| RuleError::MalformedRuleRow {
            row: 1,
            reason: e.to_string(),
        })?
        .clone();
    let columns = Columns::from_headers(&headers)?;

    let mut patterns = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let row = idx + 2;
        let record = record.map_err(|e| RuleError::MalformedRuleRow {
            row,
            reason: e.to_string(),
        })?;
        let field = columns
            .field(&record)
            .map_err(|reason| RuleError::MalformedRuleRow { row, reason })?;
        patterns.push((field, columns.pattern_text(&record)));
    }
    Ok(patterns)
}
