//! Lexicon classifier for per-interaction behavior tags.
//!
//! The `Lexicon` maps one interaction's text to a set of [`BehaviorTag`]s using
//! maintained phrase lists, not NLP. Classification is pure, deterministic and
//! case-insensitive. Text that matches nothing yields an empty tag set, which
//! reports as `none` and is a valid outcome rather than an error.

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::config::LexiconConfig;

/// A pedagogically relevant signal detected in an interaction's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorTag {
    /// Learner asked for a complete solution.
    CodeRequest,
    /// Profanity or frustration.
    HostileLanguage,
    /// A genuine question about a concept.
    ConceptualQuestion,
}

impl BehaviorTag {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeRequest => "code_request",
            Self::HostileLanguage => "hostile_language",
            Self::ConceptualQuestion => "conceptual_question",
        }
    }
}

impl std::fmt::Display for BehaviorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Set of tags derived from one interaction. Empty means `none`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviorTags(BTreeSet<BehaviorTag>);

impl BehaviorTags {
    /// The unclassified outcome.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, tag: BehaviorTag) -> bool {
        self.0.contains(&tag)
    }

    /// Whether no tag applies.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = BehaviorTag> + '_ {
        self.0.iter().copied()
    }

    /// Tag labels, `["none"]` for an empty set.
    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        if self.is_none() {
            return vec!["none"];
        }
        self.iter().map(|t| t.as_str()).collect()
    }

    fn insert(&mut self, tag: BehaviorTag) {
        self.0.insert(tag);
    }
}

impl std::fmt::Display for BehaviorTags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.labels().join(","))
    }
}

/// A pattern that fired for a tag, as reported by [`Lexicon::explain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagMatch {
    pub tag: BehaviorTag,
    pub pattern: String,
}

/// A compiled regex pattern with its source string.
#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl CompiledPattern {
    fn new(pattern: &str) -> Option<Self> {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => Some(Self {
                source: pattern.to_string(),
                regex,
            }),
            Err(e) => {
                warn!(pattern, error = %e, "Skipping invalid lexicon pattern");
                None
            }
        }
    }

    fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

fn compile_all(patterns: &[String]) -> Vec<CompiledPattern> {
    patterns
        .iter()
        .filter_map(|p| CompiledPattern::new(p))
        .collect()
}

/// Compiled phrase lists for behavior classification.
#[derive(Clone)]
pub struct Lexicon {
    code_request: Vec<CompiledPattern>,
    hostile: Vec<CompiledPattern>,
    interrogative: Vec<CompiledPattern>,
}

impl Lexicon {
    /// Compile a lexicon from configuration.
    ///
    /// Invalid patterns are skipped so that one bad entry never disables
    /// classification as a whole.
    pub fn from_config(config: &LexiconConfig) -> Self {
        Self {
            code_request: compile_all(&config.code_request),
            hostile: compile_all(&config.hostile),
            interrogative: compile_all(&config.interrogative),
        }
    }

    /// Create a lexicon with the default English and Spanish phrase lists.
    pub fn with_default_patterns() -> Self {
        Self::from_config(&LexiconConfig::default())
    }

    /// Classify one interaction's text.
    pub fn classify(&self, text: &str) -> BehaviorTags {
        let mut tags = BehaviorTags::none();
        let text = text.trim();
        if text.is_empty() {
            return tags;
        }

        let code_request = any_match(&self.code_request, text);
        if code_request {
            tags.insert(BehaviorTag::CodeRequest);
        }
        if any_match(&self.hostile, text) {
            tags.insert(BehaviorTag::HostileLanguage);
        }
        // A code request is never also counted as a genuine question.
        if !code_request && any_match(&self.interrogative, text) {
            tags.insert(BehaviorTag::ConceptualQuestion);
        }

        trace!(tags = %tags, "Lexicon classified interaction");
        tags
    }

    /// List every pattern that fired, grouped by the tag it contributes to.
    ///
    /// Interrogative matches are omitted when a code request matched, mirroring
    /// [`Lexicon::classify`].
    pub fn explain(&self, text: &str) -> Vec<TagMatch> {
        let text = text.trim();
        let mut matches = Vec::new();
        if text.is_empty() {
            return matches;
        }

        let mut push = |tag: BehaviorTag, patterns: &[CompiledPattern]| {
            for pattern in patterns.iter().filter(|p| p.is_match(text)) {
                matches.push(TagMatch {
                    tag,
                    pattern: pattern.source.clone(),
                });
            }
        };

        push(BehaviorTag::CodeRequest, &self.code_request);
        push(BehaviorTag::HostileLanguage, &self.hostile);
        if !any_match(&self.code_request, text) {
            push(BehaviorTag::ConceptualQuestion, &self.interrogative);
        }
        matches
    }
}

fn any_match(patterns: &[CompiledPattern], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::with_default_patterns()
    }
}

impl std::fmt::Debug for Lexicon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexicon")
            .field("code_request_pattern_count", &self.code_request.len())
            .field("hostile_pattern_count", &self.hostile.len())
            .field("interrogative_pattern_count", &self.interrogative.len())
            .finish()
    }
}
