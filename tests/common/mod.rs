//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Climate-themed corpus used across the integration tests
pub const PROFILES_JSONL: &str = r#"{"id": "1", "name": "Ana", "description": "I support climate action every day", "location": "Brisbane"}
{"id": 2, "name": "Bot 42", "description": "climate action bot account", "location": null}
{"id": "3", "name": "Cal", "description": "Gardening and tea", "location": "Perth"}
{"id": "4", "name": "Dee", "description": "Climate action, renewable energy", "location": "Sydney"}
{"id": "5", "name": "Eve", "description": "Climate action and renewable energy jobs", "location": "Hobart"}
{"id": "6", "name": "Fin", "description": "climate action for renewable energy", "location": "Darwin"}
{"id": "7", "name": "Gus", "description": "renewable energy stocks", "location": "Perth"}
{"id": 8, "description": ["not", "text"]}
{"id": "9", "name": "Hal", "description": "solar nerd", "tweets": ["heatwave again", "climate action now"]}
"#;

pub const RULES_CSV: &str = "polarity,pattern\ninclude,climate action\nexclude,bot\n";

pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

pub fn corpus_file(dir: &Path) -> PathBuf {
    write(dir, "profiles.jsonl", PROFILES_JSONL)
}

pub fn rules_file(dir: &Path) -> PathBuf {
    write(dir, "climate.csv", RULES_CSV)
}
