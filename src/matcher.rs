//! Rule evaluation
//!
//! Verdict policy, in order:
//!
//! 1. The first exclude rule (source order) that matches decides
//!    `matched = false`, even if include rules also match.
//! 2. Otherwise the first include rule that matches decides `matched = true`.
//! 3. Otherwise `matched = false` with no firing rule (closed world).
//!
//! Word rules match by token membership, phrase rules by contiguous run,
//! token-set rules when every token is present. Each profile field is
//! tokenized on its own, so a phrase never spans two fields.

use crate::corpus::{Corpus, CorpusError, Profile, ProfileField};
use crate::results::{MatchResult, MatchSink};
use crate::rules::{Polarity, Rule, RuleId, RulePattern, RuleSet};
use crate::tokenize::{contains_run, NormalizationPolicy, Token};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Tokens of one profile field, with a set for membership tests
#[derive(Debug, Clone)]
pub struct FieldTokens {
    pub field: ProfileField,
    pub tokens: Vec<Token>,
    set: HashSet<Token>,
}

impl FieldTokens {
    pub fn new(field: ProfileField, tokens: Vec<Token>) -> Self {
        let set = tokens.iter().cloned().collect();
        Self { field, tokens, set }
    }

    fn contains(&self, token: &str) -> bool {
        self.set.contains(token)
    }
}

/// A profile normalized once for all rules
#[derive(Debug, Clone)]
pub struct NormalizedProfile {
    pub id: String,
    pub fields: Vec<FieldTokens>,
}

impl NormalizedProfile {
    pub fn new(profile: &Profile, fields: &[ProfileField], policy: &NormalizationPolicy) -> Self {
        Self {
            id: profile.id.clone(),
            fields: fields
                .iter()
                .map(|&f| FieldTokens::new(f, policy.normalize(profile.field_text(f))))
                .collect(),
        }
    }
}

fn pattern_matches(pattern: &RulePattern, field: &FieldTokens) -> bool {
    match pattern {
        RulePattern::Word(token) => field.contains(token),
        RulePattern::Phrase(ngram) => {
            ngram.tokens().iter().all(|t| field.contains(t))
                && contains_run(&field.tokens, ngram.tokens())
        }
        RulePattern::TokenSet(tokens) => tokens.iter().all(|t| field.contains(t)),
    }
}

/// True if the rule fires anywhere in the profile
pub fn rule_matches(rule: &Rule, profile: &NormalizedProfile) -> bool {
    profile
        .fields
        .iter()
        .filter(|f| rule.field.map_or(true, |scope| scope == f.field))
        .any(|f| pattern_matches(&rule.pattern, f))
}

/// Verdict plus every rule that fired, for human review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub result: MatchResult,
    pub include_hits: Vec<RuleId>,
    pub exclude_hits: Vec<RuleId>,
}

/// Counts from a matching pass over a corpus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub seen: usize,
    pub matched: usize,
    pub skipped: usize,
}

/// Applies one rule set to profiles
#[derive(Debug, Clone)]
pub struct Matcher<'r> {
    ruleset: &'r RuleSet,
    fields: Vec<ProfileField>,
}

impl<'r> Matcher<'r> {
    /// Matcher over the default fields (name, description, location)
    pub fn new(ruleset: &'r RuleSet) -> Self {
        Self::with_fields(ruleset, &ProfileField::DEFAULT_FIELDS)
    }

    pub fn with_fields(ruleset: &'r RuleSet, fields: &[ProfileField]) -> Self {
        let mut fields = fields.to_vec();
        fields.sort();
        fields.dedup();
        Self { ruleset, fields }
    }

    pub fn ruleset(&self) -> &RuleSet {
        self.ruleset
    }

    pub fn fields(&self) -> &[ProfileField] {
        &self.fields
    }

    pub fn normalize(&self, profile: &Profile) -> NormalizedProfile {
        NormalizedProfile::new(profile, &self.fields, &self.ruleset.policy())
    }

    fn result(&self, profile_id: &str, matched: bool, rule: Option<&Rule>) -> MatchResult {
        MatchResult {
            profile_id: profile_id.to_string(),
            ruleset_name: self.ruleset.name().to_string(),
            matched,
            firing_rule_id: rule.map(|r| r.id.0),
        }
    }

    /// Evaluate an already normalized profile
    pub fn evaluate_normalized(&self, profile: &NormalizedProfile) -> MatchResult {
        if let Some(rule) = self
            .ruleset
            .excludes()
            .find(|r| rule_matches(r, profile))
        {
            return self.result(&profile.id, false, Some(rule));
        }

        match self
            .ruleset
            .includes()
            .find(|r| rule_matches(r, profile))
        {
            Some(rule) => self.result(&profile.id, true, Some(rule)),
            None => self.result(&profile.id, false, None),
        }
    }

    pub fn evaluate(&self, profile: &Profile) -> MatchResult {
        self.evaluate_normalized(&self.normalize(profile))
    }

    /// Verdict plus all include and exclude rules that fired
    pub fn explain(&self, profile: &Profile) -> Explanation {
        let normalized = self.normalize(profile);
        let hits = |polarity: Polarity| -> Vec<RuleId> {
            self.ruleset
                .rules()
                .iter()
                .filter(|r| r.polarity == polarity && rule_matches(r, &normalized))
                .map(|r| r.id)
                .collect()
        };

        Explanation {
            result: self.evaluate_normalized(&normalized),
            include_hits: hits(Polarity::Include),
            exclude_hits: hits(Polarity::Exclude),
        }
    }

    /// Match every profile in a corpus, sending results to `sink`
    ///
    /// Malformed profiles are skipped and counted.
    pub fn evaluate_corpus(
        &self,
        corpus: &dyn Corpus,
        sink: &mut dyn MatchSink,
    ) -> Result<MatchSummary, CorpusError> {
        let mut summary = MatchSummary::default();

        for item in corpus.profiles()? {
            match item {
                Ok(profile) => {
                    let result = self.evaluate(&profile);
                    summary.seen += 1;
                    if result.matched {
                        summary.matched += 1;
                    }
                    sink.record(result);
                }
                Err(malformed) => {
                    debug!("Skipping malformed profile at {}", malformed);
                    summary.skipped += 1;
                }
            }
        }

        if summary.skipped > 0 {
            warn!(
                "Skipped {} malformed profiles while applying '{}'",
                summary.skipped,
                self.ruleset.name()
            );
        }
        info!(
            "Ruleset '{}' matched {}/{} profiles",
            self.ruleset.name(),
            summary.matched,
            summary.seen
        );
        Ok(summary)
    }
}

/// Evaluate a rule set against a profile over the default fields
pub fn evaluate(ruleset: &RuleSet, profile: &Profile) -> MatchResult {
    Matcher::new(ruleset).evaluate(profile)
}

/// Evaluate free text, treated as a profile description
///
/// # Example
/// ```
/// use twittersphere::matcher::evaluate_text;
/// use twittersphere::rules::RuleSet;
/// use twittersphere::tokenize::NormalizationPolicy;
///
/// let mut rules = RuleSet::new("climate", NormalizationPolicy::default());
/// let include = rules.add_include("climate action").unwrap();
/// let exclude = rules.add_exclude("bot").unwrap();
///
/// let hit = evaluate_text(&rules, "1", "I support climate action every day");
/// assert!(hit.matched);
/// assert_eq!(hit.firing_rule_id, Some(include.0));
///
/// let vetoed = evaluate_text(&rules, "2", "climate action bot account");
/// assert!(!vetoed.matched);
/// assert_eq!(vetoed.firing_rule_id, Some(exclude.0));
/// ```
pub fn evaluate_text(ruleset: &RuleSet, profile_id: &str, text: &str) -> MatchResult {
    let profile = Profile::new(profile_id).with_field(ProfileField::Description, text);
    Matcher::with_fields(ruleset, &[ProfileField::Description]).evaluate(&profile)
}
