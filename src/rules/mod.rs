//! Include/exclude rule sets
//!
//! A rule set is an ordered list of lexical rules loaded from one rule file.
//! Row order is priority order, and the file stem names the rule set in every
//! match result it produces. Rules are validated when loaded: an unknown
//! polarity or an empty pattern fails the whole load, since a partially
//! loaded rule set would silently misclassify profiles.

mod lint;
mod loader;

pub use lint::{lint, LintReport, Redundancy};
pub(crate) use loader::pattern_rows;

use crate::corpus::ProfileField;
use crate::tokenize::{NGram, NormalizationPolicy, Token};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while loading or building a rule set
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Rule file has no '{0}' column")]
    MissingColumn(String),

    #[error("Malformed rule row {row}: {reason}")]
    MalformedRuleRow { row: usize, reason: String },
}

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Whether a rule pulls a profile into the population or vetoes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Polarity {
    Include,
    Exclude,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Include => "include",
            Polarity::Exclude => "exclude",
        }
    }

    /// Parse a polarity cell. Blank means "reviewed, no decision" and
    /// yields `None`.
    pub fn parse_cell(cell: &str) -> std::result::Result<Option<Polarity>, String> {
        match cell.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "include" | "1" | "+1" => Ok(Some(Polarity::Include)),
            "exclude" | "-1" => Ok(Some(Polarity::Exclude)),
            other => Err(format!(
                "unknown polarity '{}' (expected include, exclude, 1, -1 or blank)",
                other
            )),
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a multi-token pattern is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Tokens must appear contiguously, in order
    #[default]
    Phrase,
    /// Every token must appear somewhere in the field, any order
    All,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "phrase" => Ok(MatchMode::Phrase),
            "all" | "set" => Ok(MatchMode::All),
            other => Err(format!("unknown match mode '{}' (expected phrase or all)", other)),
        }
    }
}

/// Identifier of a rule: its 1-based data row in the rule file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a rule looks for in normalized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulePattern {
    /// Single token, matched by set membership
    Word(Token),
    /// Two or more tokens, matched as a contiguous run
    Phrase(NGram),
    /// Tokens that must all be present, in any order
    TokenSet(BTreeSet<Token>),
}

impl RulePattern {
    /// Build a pattern from normalized tokens
    pub fn from_tokens(mut tokens: Vec<Token>, mode: MatchMode) -> Option<Self> {
        match (tokens.len(), mode) {
            (0, _) => None,
            (1, _) => tokens.pop().map(RulePattern::Word),
            (_, MatchMode::Phrase) => Some(RulePattern::Phrase(NGram::new(tokens))),
            (_, MatchMode::All) => Some(RulePattern::TokenSet(tokens.into_iter().collect())),
        }
    }

    /// The pattern as an n-gram; token sets are listed in sorted order
    pub fn ngram(&self) -> NGram {
        match self {
            RulePattern::Word(token) => NGram::new(vec![token.clone()]),
            RulePattern::Phrase(ngram) => ngram.clone(),
            RulePattern::TokenSet(tokens) => NGram::new(tokens.iter().cloned().collect()),
        }
    }

    pub fn tokens(&self) -> Vec<&Token> {
        match self {
            RulePattern::Word(token) => vec![token],
            RulePattern::Phrase(ngram) => ngram.tokens().iter().collect(),
            RulePattern::TokenSet(tokens) => tokens.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RulePattern::Word(_) => 1,
            RulePattern::Phrase(ngram) => ngram.len(),
            RulePattern::TokenSet(tokens) => tokens.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `ngram` spells out exactly this pattern. Token sets compare as
    /// sets, so "climate action" restates `{action climate}`.
    pub fn restated_by(&self, ngram: &NGram) -> bool {
        match self {
            RulePattern::Word(token) => ngram.tokens() == std::slice::from_ref(token),
            RulePattern::Phrase(phrase) => phrase == ngram,
            RulePattern::TokenSet(tokens) => {
                let theirs: BTreeSet<&Token> = ngram.tokens().iter().collect();
                theirs.len() == tokens.len() && tokens.iter().all(|t| theirs.contains(t))
            }
        }
    }

    /// True if every text matched by `other` is also matched by `self`
    pub fn subsumes(&self, other: &RulePattern) -> bool {
        match (self, other) {
            (RulePattern::Word(word), _) => other.tokens().into_iter().any(|t| t == word),
            (RulePattern::Phrase(mine), RulePattern::Phrase(theirs)) => {
                theirs.contains_run(mine.tokens())
            }
            (RulePattern::Phrase(_), _) => false,
            (RulePattern::TokenSet(mine), _) => {
                let theirs: BTreeSet<&Token> = other.tokens().into_iter().collect();
                mine.iter().all(|t| theirs.contains(t))
            }
        }
    }
}

impl fmt::Display for RulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePattern::TokenSet(_) => write!(f, "{{{}}}", self.ngram()),
            _ => write!(f, "{}", self.ngram()),
        }
    }
}

/// A single validated rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: RuleId,
    pub polarity: Polarity,
    pub pattern: RulePattern,
    /// Restrict matching to one profile field; `None` matches any field
    pub field: Option<ProfileField>,
    /// Name of the rule set (file stem) the rule came from
    pub source_file: String,
    /// Position among the rules of its set, 0 = highest priority
    pub priority_order: usize,
}

impl Rule {
    /// True if the two rules can look at the same field
    pub fn shares_scope(&self, other: &Rule) -> bool {
        scopes_overlap(self.field, other.field)
    }
}

/// Two field scopes overlap unless both name a field and the fields differ
pub fn scopes_overlap(a: Option<ProfileField>, b: Option<ProfileField>) -> bool {
    match (a, b) {
        (None, _) | (_, None) => true,
        (Some(a), Some(b)) => a == b,
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} \"{}\"", self.id, self.polarity, self.pattern)?;
        if let Some(field) = self.field {
            write!(f, " in {}", field)?;
        }
        Ok(())
    }
}

/// An ordered, named collection of rules
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    policy: NormalizationPolicy,
    rules: Vec<Rule>,
    /// Rows with a blank polarity: already reviewed, not rules
    unlabelled: Vec<NGram>,
    next_row: u32,
}

impl RuleSet {
    /// Create an empty rule set
    pub fn new(name: impl Into<String>, policy: NormalizationPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            rules: Vec::new(),
            unlabelled: Vec::new(),
            next_row: 1,
        }
    }

    /// Append a rule from raw pattern text. Used for programmatic rule
    /// sets; file loading goes through the same validation.
    pub fn add_rule(
        &mut self,
        polarity: Polarity,
        pattern: &str,
        field: Option<ProfileField>,
        mode: MatchMode,
    ) -> Result<RuleId> {
        let row = self.next_row as usize;
        self.push_row(row, Some(polarity), pattern, field, mode)?;
        Ok(RuleId(row as u32))
    }

    pub fn add_include(&mut self, pattern: &str) -> Result<RuleId> {
        self.add_rule(Polarity::Include, pattern, None, MatchMode::Phrase)
    }

    pub fn add_exclude(&mut self, pattern: &str) -> Result<RuleId> {
        self.add_rule(Polarity::Exclude, pattern, None, MatchMode::Phrase)
    }

    /// Validate and append one data row. `row` is used both as the rule id
    /// and in error messages.
    pub(crate) fn push_row(
        &mut self,
        row: usize,
        polarity: Option<Polarity>,
        pattern: &str,
        field: Option<ProfileField>,
        mode: MatchMode,
    ) -> Result<()> {
        let id = self.next_row;
        self.next_row += 1;
        let tokens = self.policy.normalize(pattern);

        let Some(polarity) = polarity else {
            if !tokens.is_empty() {
                self.unlabelled.push(NGram::new(tokens));
            }
            return Ok(());
        };

        let pattern = RulePattern::from_tokens(tokens, mode).ok_or_else(|| {
            RuleError::MalformedRuleRow {
                row,
                reason: format!("pattern '{}' has no tokens after normalization", pattern),
            }
        })?;

        self.rules.push(Rule {
            id: RuleId(id),
            polarity,
            pattern,
            field,
            source_file: self.name.clone(),
            priority_order: self.rules.len(),
        });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> NormalizationPolicy {
        self.policy
    }

    /// All rules in priority order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn includes(&self) -> impl Iterator<Item = &Rule> {
        self.rules
            .iter()
            .filter(|r| r.polarity == Polarity::Include)
    }

    pub fn excludes(&self) -> impl Iterator<Item = &Rule> {
        self.rules
            .iter()
            .filter(|r| r.polarity == Polarity::Exclude)
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// N-grams reviewed without a decision (blank polarity rows)
    pub fn unlabelled(&self) -> &[NGram] {
        &self.unlabelled
    }

    /// True if `ngram`, scoped to `field`, restates a rule whose scope
    /// overlaps or an unlabelled row. Unlabelled rows cover every field.
    pub fn covers(&self, field: Option<ProfileField>, ngram: &NGram) -> bool {
        self.unlabelled.contains(ngram)
            || self
                .rules
                .iter()
                .any(|r| scopes_overlap(r.field, field) && r.pattern.restated_by(ngram))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
