//! Command-line behaviour
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn twittersphere() -> Command {
    let mut cmd = Command::cargo_bin("twittersphere").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    twittersphere()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("filter-users"))
        .stdout(predicate::str::contains("refine"))
        .stdout(predicate::str::contains("concordance"));
}

#[test]
fn test_filter_users_writes_results() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::corpus_file(dir.path());
    let rules = common::rules_file(dir.path());
    let results = dir.path().join("results.csv");

    twittersphere()
        .current_dir(dir.path())
        .arg("filter-users")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--rules")
        .arg(&rules)
        .arg("--results")
        .arg(&results)
        .assert()
        .success()
        .stdout(predicate::str::contains("climate: matched 4/8 profiles (1 skipped)"));

    let text = fs::read_to_string(&results).unwrap();
    assert!(text.starts_with("profile_id,ruleset_name,matched,firing_rule_id\n"));
    assert!(text.contains("1,climate,true,1\n"));
    assert!(text.contains("2,climate,false,2\n"));
    assert_eq!(text.lines().count(), 9);

    // re-running replaces rather than appends
    twittersphere()
        .current_dir(dir.path())
        .arg("filter-users")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--rules")
        .arg(&rules)
        .arg("--results")
        .arg(&results)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&results).unwrap(), text);
}

#[test]
fn test_malformed_rule_file_reports_row() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::corpus_file(dir.path());
    let rules = common::write(dir.path(), "bad.csv", "polarity,pattern\ninclude,ok\nmaybe,solar\n");

    twittersphere()
        .current_dir(dir.path())
        .arg("filter-users")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--rules")
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed rule row 3"));
}

#[test]
fn test_refine_writes_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::corpus_file(dir.path());
    let rules = common::rules_file(dir.path());
    let output = dir.path().join("candidates.csv");
    let cache = dir.path().join("stats.json");

    twittersphere()
        .current_dir(dir.path())
        .arg("refine")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--rules")
        .arg(&rules)
        .arg("--output")
        .arg(&output)
        .arg("--cache")
        .arg(&cache)
        .assert()
        .success()
        .stdout(predicate::str::contains("climate: wrote"));

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("ngram,polarity,field,score,rationale\n"));
    assert!(text.contains("renewable energy,include,,"));
    assert!(cache.exists());

    // second round with the first round as ledger proposes nothing new
    let second = dir.path().join("round2.csv");
    twittersphere()
        .current_dir(dir.path())
        .arg("refine")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--rules")
        .arg(&rules)
        .arg("--output")
        .arg(&second)
        .arg("--cache")
        .arg(&cache)
        .arg("--seen")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 0 candidates"));
}

#[test]
fn test_filter_users_rejects_shared_rule_set_name() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::corpus_file(dir.path());
    fs::create_dir(dir.path().join("a")).unwrap();
    fs::create_dir(dir.path().join("b")).unwrap();
    let first = common::write(&dir.path().join("a"), "climate.csv", common::RULES_CSV);
    let second = common::write(
        &dir.path().join("b"),
        "climate.csv",
        "polarity,pattern\ninclude,solar\n",
    );
    let results = dir.path().join("results.csv");

    twittersphere()
        .current_dir(dir.path())
        .arg("filter-users")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--rules")
        .arg(&first)
        .arg(&second)
        .arg("--results")
        .arg(&results)
        .assert()
        .failure()
        .stderr(predicate::str::contains("share the rule set name 'climate'"));
    assert!(!results.exists());
}

#[test]
fn test_refine_per_field_scopes_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::corpus_file(dir.path());
    let rules = common::rules_file(dir.path());
    let output = dir.path().join("candidates.csv");

    twittersphere()
        .current_dir(dir.path())
        .arg("refine")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--rules")
        .arg(&rules)
        .arg("--output")
        .arg(&output)
        .arg("--per-field")
        .assert()
        .success();

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("ngram,polarity,field,score,rationale\n"));
    assert!(text.contains("renewable energy,include,description,"));
    assert!(!text.contains("renewable energy,include,,"));
}

#[test]
fn test_explain_text() {
    let dir = tempfile::tempdir().unwrap();
    let rules = common::rules_file(dir.path());

    twittersphere()
        .current_dir(dir.path())
        .arg("explain")
        .arg("--rules")
        .arg(&rules)
        .arg("--text")
        .arg("climate action bot account")
        .assert()
        .success()
        .stdout(predicate::str::contains("not matched by #2 exclude \"bot\""))
        .stdout(predicate::str::contains("include hit: #1 include \"climate action\""));
}

#[test]
fn test_explain_profile_from_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::corpus_file(dir.path());
    let rules = common::rules_file(dir.path());

    twittersphere()
        .current_dir(dir.path())
        .arg("explain")
        .arg("--rules")
        .arg(&rules)
        .arg("--corpus")
        .arg(&corpus)
        .arg("--profile")
        .arg("4")
        .assert()
        .success()
        .stdout(predicate::str::contains("4: matched by #1"));

    // profile 9 sits after the malformed line 8
    twittersphere()
        .current_dir(dir.path())
        .arg("explain")
        .arg("--rules")
        .arg(&rules)
        .arg("--corpus")
        .arg(&corpus)
        .arg("--profile")
        .arg("9")
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Skipped 1 malformed profiles while looking for '9'",
        ));

    twittersphere()
        .current_dir(dir.path())
        .arg("explain")
        .arg("--rules")
        .arg(&rules)
        .arg("--corpus")
        .arg(&corpus)
        .arg("--profile")
        .arg("404")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_lint_strict() {
    let dir = tempfile::tempdir().unwrap();
    let rules = common::write(
        dir.path(),
        "geo.csv",
        "polarity,pattern\ninclude,australia\ninclude,brisbane australia\n",
    );

    twittersphere()
        .current_dir(dir.path())
        .arg("lint")
        .arg("--rules")
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("redundant: rule 2 is subsumed by rule 1"));

    twittersphere()
        .current_dir(dir.path())
        .arg("lint")
        .arg("--rules")
        .arg(&rules)
        .arg("--strict")
        .assert()
        .failure();
}

#[test]
fn test_qa_sample_and_concordance() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::corpus_file(dir.path());
    let rules = common::rules_file(dir.path());
    let results = dir.path().join("results.csv");
    let qa_file = dir.path().join("qa.csv");

    twittersphere()
        .current_dir(dir.path())
        .args(["filter-users", "--corpus"])
        .arg(&corpus)
        .arg("--rules")
        .arg(&rules)
        .arg("--results")
        .arg(&results)
        .assert()
        .success();

    twittersphere()
        .current_dir(dir.path())
        .arg("qa-sample")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--results")
        .arg(&results)
        .args(["--ruleset", "climate", "--count", "4", "--seed", "11"])
        .arg("--output")
        .arg(&qa_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 4 QA rows"))
        .stdout(predicate::str::contains("(1 skipped)"))
        .stderr(predicate::str::contains("Skipped 1 malformed profiles"));

    let sheet = fs::read_to_string(&qa_file).unwrap();
    assert!(sheet.starts_with(
        "name,description,location,unique_profiles,tweet_count,obfuscated_match,human_label\n"
    ));

    twittersphere()
        .current_dir(dir.path())
        .arg("concordance")
        .arg(&qa_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("agreement:"))
        .stdout(predicate::str::contains("tweet-weighted agreement:"));
}

#[test]
fn test_qa_sample_unknown_ruleset() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::corpus_file(dir.path());

    twittersphere()
        .current_dir(dir.path())
        .arg("qa-sample")
        .arg("--corpus")
        .arg(&corpus)
        .args(["--ruleset", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No stored results"));
}

#[test]
fn test_invalid_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let rules = common::rules_file(dir.path());
    let config = common::write(dir.path(), "bad.toml", "[ngrams]\nmin = 0\n");

    twittersphere()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("lint")
        .arg("--rules")
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));
}
