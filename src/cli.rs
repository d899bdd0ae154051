//! CLI argument parsing for twittersphere

use crate::qa::Sampling;
use crate::stats::ScoreKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "twittersphere")]
#[command(version)]
#[command(about = "Lexical rule engine for classifying social-media profiles", long_about = None)]
pub struct Cli {
    /// Log everything to stderr (trace level)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration file (default: ./twittersphere.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply rule files to a corpus and store one verdict per profile and rule set
    FilterUsers(FilterUsersArgs),

    /// Propose new include rules from n-gram statistics
    Refine(RefineArgs),

    /// Show every rule that fires on a profile or a piece of text
    Explain(ExplainArgs),

    /// Report redundant and unanchored rules
    Lint(LintArgs),

    /// Draw a blind QA sample for human labelling
    QaSample(QaSampleArgs),

    /// Compare human labels in a QA sheet with the machine verdicts
    Concordance(ConcordanceArgs),
}

#[derive(Args, Debug)]
pub struct FilterUsersArgs {
    /// Profile corpus (JSON lines)
    #[arg(long, value_name = "FILE")]
    pub corpus: PathBuf,

    /// Rule files; each is applied as its own rule set
    #[arg(long = "rules", value_name = "FILE", required = true, num_args = 1..)]
    pub rules: Vec<PathBuf>,

    /// Match results CSV, updated in place
    #[arg(long, value_name = "FILE", default_value = "results.csv")]
    pub results: PathBuf,
}

#[derive(Args, Debug)]
pub struct RefineArgs {
    #[arg(long, value_name = "FILE")]
    pub corpus: PathBuf,

    /// Rule file being refined
    #[arg(long, value_name = "FILE")]
    pub rules: PathBuf,

    /// Stored match results; the corpus is matched in memory when the rule
    /// set has no stored rows
    #[arg(long, value_name = "FILE")]
    pub results: Option<PathBuf>,

    /// Candidate CSV to write
    #[arg(short, long, value_name = "FILE", default_value = "candidates.csv")]
    pub output: PathBuf,

    /// Earlier candidate or rule files whose n-grams were already reviewed
    #[arg(long = "seen", value_name = "FILE", num_args = 1..)]
    pub seen: Vec<PathBuf>,

    /// N-gram statistics cache (JSON)
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    #[arg(long, value_name = "N")]
    pub min_support: Option<u64>,

    #[arg(long, value_name = "N")]
    pub max_candidates: Option<usize>,

    #[arg(long, value_enum)]
    pub score: Option<ScoreKind>,

    /// Also propose n-grams that contain an existing include rule
    #[arg(long)]
    pub keep_subsumed: bool,

    /// Count n-grams per profile field and propose field-scoped rules
    #[arg(long)]
    pub per_field: bool,
}

#[derive(Args, Debug)]
pub struct ExplainArgs {
    #[arg(long, value_name = "FILE")]
    pub rules: PathBuf,

    /// Free text, treated as a profile description
    #[arg(long, conflicts_with_all = ["corpus", "profile"])]
    pub text: Option<String>,

    #[arg(long, value_name = "FILE", requires = "profile")]
    pub corpus: Option<PathBuf>,

    /// Profile id to look up in the corpus
    #[arg(long, value_name = "ID", requires = "corpus")]
    pub profile: Option<String>,
}

#[derive(Args, Debug)]
pub struct LintArgs {
    #[arg(long, value_name = "FILE")]
    pub rules: PathBuf,

    /// Exit with an error when there are findings
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct QaSampleArgs {
    #[arg(long, value_name = "FILE")]
    pub corpus: PathBuf,

    #[arg(long, value_name = "FILE", default_value = "results.csv")]
    pub results: PathBuf,

    /// Rule set whose verdicts are sampled
    #[arg(long, value_name = "NAME")]
    pub ruleset: String,

    #[arg(short, long, value_name = "FILE", default_value = "qa.csv")]
    pub output: PathBuf,

    /// Number of distinct profiles to draw
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,

    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    #[arg(long, value_enum)]
    pub sampling: Option<Sampling>,
}

#[derive(Args, Debug)]
pub struct ConcordanceArgs {
    /// Labelled QA sheet
    #[arg(value_name = "FILE")]
    pub input: PathBuf,
}
