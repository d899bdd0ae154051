//! twittersphere - lexical rule engine for classifying social-media profiles
//!
//! Profiles are matched against ordered include/exclude word and phrase
//! rules, and rule sets are refined by mining n-grams that separate the
//! matched population from the rest of the corpus. Matching is exactly
//! reproducible; refinement only ever proposes rules for human review.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod matcher;
pub mod qa;
pub mod refine;
pub mod results;
pub mod rules;
pub mod stats;
pub mod tokenize;
