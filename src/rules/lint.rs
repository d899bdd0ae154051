//! Rule set audit
//!
//! Reports rules a reviewer may want to clean up. Nothing here changes how a
//! rule set matches: a redundant rule never changes a verdict, only which
//! rule is named as the firing rule.

use super::{Rule, RuleId, RuleSet};
use std::fmt;

/// A rule whose matches are always matched by another rule of the same
/// polarity and field scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redundancy {
    pub rule: RuleId,
    pub subsumed_by: RuleId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    pub redundant: Vec<Redundancy>,
    /// Exclude rules sharing no token with any include rule; they veto
    /// profiles whatever include rule matched them
    pub unanchored_excludes: Vec<RuleId>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.redundant.is_empty() && self.unanchored_excludes.is_empty()
    }
}

impl fmt::Display for LintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return writeln!(f, "No findings.");
        }
        for r in &self.redundant {
            writeln!(f, "redundant: rule {} is subsumed by rule {}", r.rule, r.subsumed_by)?;
        }
        for id in &self.unanchored_excludes {
            writeln!(
                f,
                "unanchored: exclude rule {} shares no token with any include rule",
                id
            )?;
        }
        Ok(())
    }
}

/// `general` covers `specific`: every profile `specific` fires on,
/// `general` fires on too
fn covers(general: &Rule, specific: &Rule) -> bool {
    if general.polarity != specific.polarity {
        return false;
    }
    let scope_ok = match (general.field, specific.field) {
        (None, _) => true,
        (Some(a), Some(b)) => a == b,
        (Some(_), None) => false,
    };
    if !scope_ok || !general.pattern.subsumes(&specific.pattern) {
        return false;
    }
    // Identical patterns: the later duplicate is the redundant one
    general.pattern.len() < specific.pattern.len()
        || general.priority_order < specific.priority_order
}

/// Audit a rule set for redundant and unanchored rules
pub fn lint(ruleset: &RuleSet) -> LintReport {
    let rules = ruleset.rules();
    let mut report = LintReport::default();

    for rule in rules {
        if let Some(general) = rules
            .iter()
            .find(|other| other.id != rule.id && covers(other, rule))
        {
            report.redundant.push(Redundancy {
                rule: rule.id,
                subsumed_by: general.id,
            });
        }
    }

    for exclude in ruleset.excludes() {
        let tokens = exclude.pattern.tokens();
        let anchored = ruleset.includes().any(|include| {
            include.shares_scope(exclude)
                && include
                    .pattern
                    .tokens()
                    .into_iter()
                    .any(|t| tokens.contains(&t))
        });
        if !anchored {
            report.unanchored_excludes.push(exclude.id);
        }
    }

    report
}
