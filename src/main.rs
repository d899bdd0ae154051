use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use twittersphere::cli::{
    Cli, Command, ConcordanceArgs, ExplainArgs, FilterUsersArgs, LintArgs, QaSampleArgs,
    RefineArgs,
};
use twittersphere::config::EngineConfig;
use twittersphere::corpus::{Corpus, JsonlCorpus, Profile, ProfileField};
use twittersphere::matcher::Matcher;
use twittersphere::qa;
use twittersphere::refine::{self, SeenCandidates};
use twittersphere::results::MatchStore;
use twittersphere::rules::{self, RuleSet};
use twittersphere::stats::{cached_ngram_stats, StatsCache, Verdicts};

/// Initialize tracing subscriber; `--debug` turns on trace output
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_rules(path: &Path, config: &EngineConfig) -> Result<RuleSet> {
    RuleSet::from_path(path, config.normalization)
        .with_context(|| format!("Failed to load rule file: {}", path.display()))
}

fn load_results(path: &Path) -> Result<MatchStore> {
    MatchStore::load(path)
        .with_context(|| format!("Failed to load match results: {}", path.display()))
}

fn filter_users(args: FilterUsersArgs, config: &EngineConfig) -> Result<()> {
    let corpus = JsonlCorpus::new(&args.corpus);
    let mut store = load_results(&args.results)?;

    // Results are keyed by rule set name, so two files with one stem would clobber each other
    let mut by_name: BTreeMap<String, &Path> = BTreeMap::new();
    let mut rulesets = Vec::with_capacity(args.rules.len());
    for path in &args.rules {
        let ruleset = load_rules(path, config)?;
        if let Some(earlier) = by_name.insert(ruleset.name().to_string(), path) {
            anyhow::bail!(
                "Rule files {} and {} share the rule set name '{}'",
                earlier.display(),
                path.display(),
                ruleset.name()
            );
        }
        rulesets.push(ruleset);
    }

    for ruleset in &rulesets {
        let replaced = store.clear_ruleset(ruleset.name());
        if replaced > 0 {
            info!("Replacing {} stored results for '{}'", replaced, ruleset.name());
        }

        let matcher = Matcher::with_fields(ruleset, &config.matching.fields);
        let summary = matcher
            .evaluate_corpus(&corpus, &mut store)
            .with_context(|| format!("Failed to read corpus: {}", args.corpus.display()))?;

        println!(
            "{}: matched {}/{} profiles ({} skipped)",
            ruleset.name(),
            summary.matched,
            summary.seen,
            summary.skipped
        );
    }

    store
        .save(&args.results)
        .with_context(|| format!("Failed to write match results: {}", args.results.display()))?;
    Ok(())
}

/// Stored verdicts for the rule set, or a fresh in-memory matching pass
fn verdicts_for(
    ruleset: &RuleSet,
    corpus: &dyn Corpus,
    results: Option<&Path>,
    config: &EngineConfig,
) -> Result<Verdicts> {
    if let Some(path) = results {
        let store = load_results(path)?;
        let verdicts = store.verdicts(ruleset.name());
        if !verdicts.is_empty() {
            return Ok(verdicts);
        }
        warn!(
            "No stored results for '{}' in {}, matching in memory",
            ruleset.name(),
            path.display()
        );
    }

    let mut store = MatchStore::new();
    Matcher::with_fields(ruleset, &config.matching.fields).evaluate_corpus(corpus, &mut store)?;
    Ok(store.verdicts(ruleset.name()))
}

fn run_refine(args: RefineArgs, config: &EngineConfig) -> Result<()> {
    let mut refine_config = config.refine.clone();
    if let Some(min_support) = args.min_support {
        refine_config.min_support = min_support;
    }
    if let Some(max) = args.max_candidates {
        refine_config.max_candidates = Some(max);
    }
    if let Some(score) = args.score {
        refine_config.score = score;
    }
    if args.keep_subsumed {
        refine_config.skip_subsumed = false;
    }
    refine_config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid refine settings: {}", e))?;

    let ruleset = load_rules(&args.rules, config)?;
    let corpus = JsonlCorpus::new(&args.corpus);
    let verdicts = verdicts_for(&ruleset, &corpus, args.results.as_deref(), config)?;
    let mut options = config.stats_options();
    if args.per_field {
        options.per_field = true;
    }

    let cached = match &args.cache {
        Some(path) => match StatsCache::load(path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Ignoring unreadable stats cache {}: {}", path.display(), e);
                None
            }
        },
        None => None,
    };
    let (cache, recomputed) = cached_ngram_stats(&corpus, &verdicts, &options, cached)
        .with_context(|| format!("Failed to read corpus: {}", args.corpus.display()))?;
    if let (Some(path), true) = (&args.cache, recomputed) {
        cache
            .save(path)
            .with_context(|| format!("Failed to write stats cache: {}", path.display()))?;
    }

    let seen = SeenCandidates::from_paths(args.seen.as_slice(), &config.normalization)
        .context("Failed to load previously seen candidates")?;
    let candidates = refine::refine(&ruleset, &cache.report, &seen, &refine_config)?;

    refine::save_candidates(&args.output, &candidates)
        .with_context(|| format!("Failed to write candidates: {}", args.output.display()))?;
    println!(
        "{}: wrote {} candidates to {}",
        ruleset.name(),
        candidates.len(),
        args.output.display()
    );
    Ok(())
}

fn find_profile(corpus: &dyn Corpus, id: &str) -> Result<Option<Profile>> {
    let mut skipped = 0;
    let mut found = None;
    for item in corpus.profiles()? {
        match item {
            Ok(profile) if profile.id == id => {
                found = Some(profile);
                break;
            }
            Ok(_) => {}
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(
            "Skipped {} malformed profiles while looking for '{}'",
            skipped, id
        );
    }
    Ok(found)
}

fn explain(args: ExplainArgs, config: &EngineConfig) -> Result<()> {
    let ruleset = load_rules(&args.rules, config)?;

    let (matcher, profile) = match (args.text, args.corpus, args.profile) {
        (Some(text), _, _) => (
            Matcher::with_fields(&ruleset, &[ProfileField::Description]),
            Profile::new("text").with_field(ProfileField::Description, text),
        ),
        (None, Some(corpus_path), Some(id)) => {
            let corpus = JsonlCorpus::new(&corpus_path);
            let profile = find_profile(&corpus, &id)?.with_context(|| {
                format!("Profile '{}' not found in {}", id, corpus_path.display())
            })?;
            (Matcher::with_fields(&ruleset, &config.matching.fields), profile)
        }
        _ => anyhow::bail!("Pass either --text or both --corpus and --profile"),
    };

    let explanation = matcher.explain(&profile);
    let verdict = if explanation.result.matched {
        "matched"
    } else {
        "not matched"
    };
    match explanation.result.firing_rule().and_then(|id| ruleset.get(id)) {
        Some(rule) => println!("{}: {} by {}", profile.id, verdict, rule),
        None => println!("{}: {} (no rule fired)", profile.id, verdict),
    }
    for (label, hits) in [
        ("include", &explanation.include_hits),
        ("exclude", &explanation.exclude_hits),
    ] {
        for id in hits {
            if let Some(rule) = ruleset.get(*id) {
                println!("  {} hit: {}", label, rule);
            }
        }
    }
    Ok(())
}

fn lint(args: LintArgs, config: &EngineConfig) -> Result<()> {
    let ruleset = load_rules(&args.rules, config)?;
    let report = rules::lint(&ruleset);
    print!("{}", report);
    if args.strict && !report.is_clean() {
        anyhow::bail!("Lint found issues in {}", args.rules.display());
    }
    Ok(())
}

fn qa_sample(args: QaSampleArgs, config: &EngineConfig) -> Result<()> {
    let corpus = JsonlCorpus::new(&args.corpus);
    let store = load_results(&args.results)?;
    let verdicts = store.verdicts(&args.ruleset);
    if verdicts.is_empty() {
        anyhow::bail!(
            "No stored results for rule set '{}' in {}",
            args.ruleset,
            args.results.display()
        );
    }

    let count = args.count.unwrap_or(config.qa.count);
    let seed = args
        .seed
        .or(config.qa.seed)
        .unwrap_or_else(rand::random::<u64>);
    let sampling = args.sampling.unwrap_or(config.qa.sampling);
    info!("QA sample seed: {}", seed);

    let sample = qa::qa_sample(&corpus, &verdicts, count, seed, sampling)?;
    qa::save_sample(&args.output, &sample.rows)?;
    println!(
        "Wrote {} QA rows to {} ({} skipped)",
        sample.rows.len(),
        args.output.display(),
        sample.skipped
    );
    Ok(())
}

fn concordance(args: ConcordanceArgs) -> Result<()> {
    let report = qa::concordance_from_path(&args.input)?;
    print!("{}", report);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::FilterUsers(args) => filter_users(args, &config),
        Command::Refine(args) => run_refine(args, &config),
        Command::Explain(args) => explain(args, &config),
        Command::Lint(args) => lint(args, &config),
        Command::QaSample(args) => qa_sample(args, &config),
        Command::Concordance(args) => concordance(args),
    }
}
