//! Profile corpus access
//!
//! The relational store that deduplicates profiles lives outside this crate;
//! the engine only needs to iterate `(profile_id, field texts)` one or more
//! times. [`Corpus`] is that seam. Two implementations ship here: an
//! in-memory corpus for tests and embedding, and [`JsonlCorpus`], which
//! streams a JSON-lines profile export from disk on every pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors opening a corpus for iteration
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Failed to open corpus {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A profile record that could not be used; skipped and counted, never fatal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct MalformedProfile {
    pub line: usize,
    pub reason: String,
}

/// Text fields of a profile that rules can look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileField {
    Name,
    Description,
    Location,
    /// Tweet text authored by the profile, joined by newlines
    Tweets,
}

impl ProfileField {
    /// Fields matched when nothing else is configured
    pub const DEFAULT_FIELDS: [ProfileField; 3] = [
        ProfileField::Name,
        ProfileField::Description,
        ProfileField::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::Name => "name",
            ProfileField::Description => "description",
            ProfileField::Location => "location",
            ProfileField::Tweets => "tweets",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "realname" => Ok(ProfileField::Name),
            "description" | "bio" => Ok(ProfileField::Description),
            "location" => Ok(ProfileField::Location),
            "tweets" | "text" => Ok(ProfileField::Tweets),
            other => Err(format!("unknown profile field '{}'", other)),
        }
    }
}

/// A user profile: unique id plus raw field texts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    pub id: String,
    pub fields: BTreeMap<ProfileField, String>,
    /// Tweets collected for the profile; weights QA concordance
    pub tweet_count: u64,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
            tweet_count: 0,
        }
    }

    pub fn with_tweet_count(mut self, tweet_count: u64) -> Self {
        self.tweet_count = tweet_count;
        self
    }

    pub fn with_field(mut self, field: ProfileField, text: impl Into<String>) -> Self {
        self.fields.insert(field, text.into());
        self
    }

    /// Raw text of a field, empty if absent
    pub fn field_text(&self, field: ProfileField) -> &str {
        self.fields.get(&field).map(String::as_str).unwrap_or("")
    }

    /// The (name, description, location) texts used to group identical
    /// profiles for QA sampling
    pub fn display_key(&self) -> (String, String, String) {
        (
            self.field_text(ProfileField::Name).to_string(),
            self.field_text(ProfileField::Description).to_string(),
            self.field_text(ProfileField::Location).to_string(),
        )
    }
}

/// One item produced by a corpus pass
pub type CorpusItem = Result<Profile, MalformedProfile>;

/// Boxed iterator over one corpus pass
pub type ProfileIter<'a> = Box<dyn Iterator<Item = CorpusItem> + Send + 'a>;

/// Re-iterable source of profiles
pub trait Corpus {
    /// Start a new pass over every profile in a stable order
    fn profiles(&self) -> Result<ProfileIter<'_>, CorpusError>;
}

/// Corpus held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    items: Vec<CorpusItem>,
}

impl MemoryCorpus {
    pub fn new(profiles: Vec<Profile>) -> Self {
        Self {
            items: profiles.into_iter().map(Ok).collect(),
        }
    }

    /// Build from profiles whose only text is a single description
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self::new(
            texts
                .into_iter()
                .map(|(id, text)| Profile::new(id).with_field(ProfileField::Description, text))
                .collect(),
        )
    }

    /// Add a record the engine must skip
    pub fn push_malformed(&mut self, malformed: MalformedProfile) {
        self.items.push(Err(malformed));
    }

    pub fn push(&mut self, profile: Profile) {
        self.items.push(Ok(profile));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Corpus for MemoryCorpus {
    fn profiles(&self) -> Result<ProfileIter<'_>, CorpusError> {
        Ok(Box::new(self.items.iter().cloned()))
    }
}

/// JSON-lines profile export, one object per line:
///
/// ```text
/// {"id": "42", "name": "Jo", "description": "climate action", "location": "Brisbane", "tweets": ["..."]}
/// ```
///
/// `id` may be a string or an integer. Text fields may be strings, `null`
/// or absent; `tweets` may be a string or an array of strings. The tweet
/// count is `tweet_count` when present, else the number of `tweets`.
/// Anything else makes the line malformed.
#[derive(Debug, Clone)]
pub struct JsonlCorpus {
    path: PathBuf,
}

impl JsonlCorpus {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Corpus for JsonlCorpus {
    fn profiles(&self) -> Result<ProfileIter<'_>, CorpusError> {
        let file = File::open(&self.path).map_err(|source| CorpusError::Open {
            path: self.path.clone(),
            source,
        })?;

        let lines = BufReader::new(file).lines().enumerate();
        Ok(Box::new(lines.filter_map(|(idx, line)| {
            let line_no = idx + 1;
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(parse_profile_line(&line, line_no)),
                Err(e) => Some(Err(MalformedProfile {
                    line: line_no,
                    reason: e.to_string(),
                })),
            }
        })))
    }
}

/// Parse one JSON-lines profile record
pub fn parse_profile_line(line: &str, line_no: usize) -> CorpusItem {
    let malformed = |reason: String| MalformedProfile {
        line: line_no,
        reason,
    };

    let value: Value = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| malformed("record is not a JSON object".to_string()))?;

    let id = match object.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(malformed("'id' must be a string or integer".to_string())),
        None => return Err(malformed("missing 'id'".to_string())),
    };

    let mut profile = Profile::new(id);
    for field in [
        ProfileField::Name,
        ProfileField::Description,
        ProfileField::Location,
    ] {
        match object.get(field.as_str()) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => {
                profile.fields.insert(field, s.clone());
            }
            Some(_) => return Err(malformed(format!("'{}' is not text", field))),
        }
    }

    match object.get("tweets") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) => {
            profile.tweet_count = u64::from(!s.trim().is_empty());
            profile.fields.insert(ProfileField::Tweets, s.clone());
        }
        Some(Value::Array(items)) => {
            let mut texts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => texts.push(s.as_str()),
                    _ => return Err(malformed("'tweets' contains non-text entries".to_string())),
                }
            }
            profile.tweet_count = texts.len() as u64;
            profile.fields.insert(ProfileField::Tweets, texts.join("\n"));
        }
        Some(_) => return Err(malformed("'tweets' is not text".to_string())),
    }

    match object.get("tweet_count") {
        None | Some(Value::Null) => {}
        Some(value) => {
            profile.tweet_count = value.as_u64().ok_or_else(|| {
                malformed("'tweet_count' must be a non-negative integer".to_string())
            })?;
        }
    }

    Ok(profile)
}
