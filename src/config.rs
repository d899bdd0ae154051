//! Engine configuration (`twittersphere.toml`)
//!
//! Every table and key is optional; missing values fall back to defaults.
//!
//! ```toml
//! [normalization]
//! strip_diacritics = false
//!
//! [ngrams]
//! min = 1
//! max = 3
//! per_field = false
//!
//! [matching]
//! fields = ["name", "description", "location"]
//!
//! [refine]
//! min_support = 2
//! max_candidates = 100
//! score = "log-odds"
//! skip_subsumed = true
//!
//! [qa]
//! count = 200
//! sampling = "class-stratified"
//! ```

use crate::corpus::ProfileField;
use crate::qa::Sampling;
use crate::refine::RefineConfig;
use crate::stats::StatsOptions;
use crate::tokenize::NormalizationPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "twittersphere.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NGramConfig {
    pub min: usize,
    pub max: usize,
    /// Count each profile field separately
    pub per_field: bool,
}

impl Default for NGramConfig {
    fn default() -> Self {
        Self {
            min: 1,
            max: 3,
            per_field: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    pub fields: Vec<ProfileField>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fields: ProfileField::DEFAULT_FIELDS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QaConfig {
    pub count: usize,
    /// Fixed seed for reproducible samples; random when absent
    pub seed: Option<u64>,
    pub sampling: Sampling,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            count: 200,
            seed: None,
            sampling: Sampling::ClassStratified,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub normalization: NormalizationPolicy,
    pub ngrams: NGramConfig,
    pub matching: MatchingConfig,
    pub refine: RefineConfig,
    pub qa: QaConfig,
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path, else `twittersphere.toml` if present, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ngrams.min == 0 || self.ngrams.min > self.ngrams.max {
            anyhow::bail!(
                "ngrams: need 1 <= min <= max, got min={} max={}",
                self.ngrams.min,
                self.ngrams.max
            );
        }
        if self.matching.fields.is_empty() {
            anyhow::bail!("matching.fields must name at least one field");
        }
        self.refine
            .validate()
            .map_err(|e| anyhow::anyhow!("refine: {}", e))?;
        Ok(())
    }

    pub fn stats_options(&self) -> StatsOptions {
        StatsOptions {
            min_n: self.ngrams.min,
            max_n: self.ngrams.max,
            policy: self.normalization,
            fields: self.matching.fields.clone(),
            per_field: self.ngrams.per_field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ScoreKind;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stats_options(), StatsOptions::default());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_tables() {
        let config = EngineConfig::from_toml_str(
            r#"
            [normalization]
            strip_diacritics = true

            [matching]
            fields = ["description", "tweets"]

            [refine]
            min_support = 5
            score = "relative-frequency"
            "#,
        )
        .unwrap();
        assert!(config.normalization.strip_diacritics);
        assert_eq!(
            config.matching.fields,
            vec![ProfileField::Description, ProfileField::Tweets]
        );
        assert_eq!(config.refine.min_support, 5);
        assert_eq!(config.refine.score, ScoreKind::RelativeFrequency);
        assert!(config.refine.skip_subsumed);
        assert_eq!(config.ngrams, NGramConfig::default());
    }

    #[test]
    fn test_per_field_reaches_stats_options() {
        let config = EngineConfig::from_toml_str("[ngrams]\nper_field = true\n").unwrap();
        assert_eq!(config.ngrams.max, 3);
        assert!(config.stats_options().per_field);
        assert!(!EngineConfig::default().stats_options().per_field);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::from_toml_str("[ngrams]\nmin = 3\nmax = 2\n").is_err());
        assert!(EngineConfig::from_toml_str("[matching]\nfields = []\n").is_err());
        assert!(EngineConfig::from_toml_str("[refine]\nmin_support = 0\n").is_err());
        assert!(EngineConfig::from_toml_str("[matching]\nfields = [\"email\"]\n").is_err());
        assert!(EngineConfig::from_toml_str("[ngram]\nmin = 1\n").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twittersphere.toml");
        std::fs::write(&path, "[qa]\ncount = 10\nseed = 4\n").unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.qa.count, 10);
        assert_eq!(config.qa.seed, Some(4));

        let err = EngineConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
