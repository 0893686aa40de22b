//! Engine configuration types.
//!
//! Provides configuration for the lexicon phrase lists, risk scoring weights
//! and thresholds, and the session actor runtime.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Main configuration for the risk engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Phrase lists for the lexicon classifier.
    pub lexicon: LexiconConfig,
    /// Weights and thresholds for risk scoring.
    pub scoring: ScoringConfig,
    /// Session actor runtime settings.
    pub engine: RuntimeConfig,
}

impl EngineConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Serialization(e.to_string()))
    }

    /// Reject configurations that cannot produce meaningful tiers.
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        if self.engine.session_channel_capacity == 0 {
            return Err(EngineError::Config(
                "engine.session_channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.engine.broadcast_capacity == 0 {
            return Err(EngineError::Config(
                "engine.broadcast_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Regex phrase lists used by the lexicon classifier.
///
/// Patterns are case-insensitive by default; an explicit `(?i)` is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    /// Requests for a complete solution ("give me the code").
    pub code_request: Vec<String>,
    /// Profanity and frustration markers.
    pub hostile: Vec<String>,
    /// Interrogative markers that signal a genuine question.
    pub interrogative: Vec<String>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            code_request: vec![
                r"\b(give|send|show) me the (code|solution|answer)\b".to_string(),
                r"\b(write|code) (the|a|my) (solution|program|function|code)\b".to_string(),
                r"\b(do|solve|finish) (it|this|the exercise|my homework) for me\b".to_string(),
                r"\bjust (give|tell) me the (code|answer)\b".to_string(),
                r"\bdame (el|la) (c[oó]digo|soluci[oó]n|respuesta)\b".to_string(),
                r"\b(hazme|resu[eé]lveme|h[aá]zmelo|resu[eé]lvelo)\b".to_string(),
                r"\bescr[ií]be(me)? (el|la) (c[oó]digo|soluci[oó]n|funci[oó]n)\b".to_string(),
                r"\bhaz (el|este) ejercicio\b".to_string(),
                r"\bp[aá]same (el|la) (c[oó]digo|soluci[oó]n)\b".to_string(),
            ],
            hostile: vec![
                r"\b(fuck\w*|shit\w*|damn\w*|crap)\b".to_string(),
                r"\b(stupid|idiot\w*|useless|dumb)\b".to_string(),
                r"\bi hate (this|you|it)\b".to_string(),
                r"\b(mierda|joder|carajo|puta|puto|co[nñ]o)\b".to_string(),
                r"\b(est[uú]pid[oa]|idiota|in[uú]til|imb[eé]cil)\b".to_string(),
                r"\b(odio esto|te odio|no sirves)\b".to_string(),
            ],
            interrogative: vec![
                r"\b(what|why|how)\b".to_string(),
                r"¿".to_string(),
                r"\?".to_string(),
                r"\b(qué|cómo|por qué|cuándo|cuál)\b".to_string(),
            ],
        }
    }
}

impl LexiconConfig {
    /// Merge another lexicon config into this one.
    ///
    /// Patterns from `other` are appended to existing patterns.
    pub fn merge(&mut self, other: &LexiconConfig) {
        self.code_request.extend(other.code_request.iter().cloned());
        self.hostile.extend(other.hostile.iter().cloned());
        self.interrogative.extend(other.interrogative.iter().cloned());
    }
}

/// Weights and thresholds for the risk scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the AI dependency ratio.
    pub dependency_weight: f64,
    /// Weight of repeated attempts per exercise.
    pub attempts_weight: f64,
    /// Weight of incomplete exercises.
    pub completion_weight: f64,
    /// Weight of low practice time.
    pub time_weight: f64,
    /// Highest score still tiered `low`.
    pub low_max: u8,
    /// Highest score still tiered `medium`.
    pub medium_max: u8,
    /// Hostile messages needed for the `emotional` dimension.
    pub emotional_hostile_threshold: u32,
    /// Code requests needed for the `ai_dependency` dimension.
    pub dependency_code_request_threshold: u32,
    /// Practice minutes at which the time factor reaches zero.
    pub target_minutes: f64,
    /// Attempts per exercise at which the attempts factor saturates.
    pub saturation_attempts: f64,
    /// Score automatically whenever a graded submission is ingested.
    pub assess_on_submission: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            dependency_weight: 0.4,
            attempts_weight: 0.3,
            completion_weight: 0.2,
            time_weight: 0.1,
            low_max: 40,
            medium_max: 60,
            emotional_hostile_threshold: 2,
            dependency_code_request_threshold: 3,
            target_minutes: 60.0,
            saturation_attempts: 5.0,
            assess_on_submission: true,
        }
    }
}

impl ScoringConfig {
    fn validate(&self) -> Result<()> {
        if self.low_max >= self.medium_max || self.medium_max > 100 {
            return Err(EngineError::Config(format!(
                "scoring thresholds must satisfy low_max < medium_max <= 100 (got {} / {})",
                self.low_max, self.medium_max
            )));
        }
        let weights = [
            self.dependency_weight,
            self.attempts_weight,
            self.completion_weight,
            self.time_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::Config(
                "scoring weights must be finite and non-negative".to_string(),
            ));
        }
        if self.target_minutes.is_nan() || self.target_minutes <= 0.0 {
            return Err(EngineError::Config(
                "scoring.target_minutes must be positive".to_string(),
            ));
        }
        if self.saturation_attempts.is_nan() || self.saturation_attempts <= 1.0 {
            return Err(EngineError::Config(
                "scoring.saturation_attempts must be greater than one".to_string(),
            ));
        }
        Ok(())
    }
}

/// Session actor runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bounded inbox size of each session actor.
    pub session_channel_capacity: usize,
    /// Buffer of the assessment broadcast channel.
    pub broadcast_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session_channel_capacity: 256,
            broadcast_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_default_values() {
        let config = EngineConfig::default();

        assert_eq!(config.scoring.dependency_weight, 0.4);
        assert_eq!(config.scoring.attempts_weight, 0.3);
        assert_eq!(config.scoring.completion_weight, 0.2);
        assert_eq!(config.scoring.time_weight, 0.1);
        assert_eq!(config.scoring.low_max, 40);
        assert_eq!(config.scoring.medium_max, 60);
        assert_eq!(config.scoring.emotional_hostile_threshold, 2);
        assert_eq!(config.scoring.dependency_code_request_threshold, 3);
        assert!(config.scoring.assess_on_submission);
        assert_eq!(config.engine.session_channel_capacity, 256);
        assert!(!config.lexicon.code_request.is_empty());
        assert!(!config.lexicon.hostile.is_empty());
        assert!(!config.lexicon.interrogative.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn engine_config_serialization_roundtrip() {
        let config = EngineConfig::default();
        let toml_str = config.to_toml_string().expect("serialize to toml");
        let parsed = EngineConfig::from_toml_str(&toml_str).expect("parse from toml");

        assert_eq!(config, parsed);
    }

    #[test]
    fn engine_config_partial_deserialize() {
        let toml_str = r#"
            [scoring]
            low_max = 30
            assess_on_submission = false
        "#;

        let config = EngineConfig::from_toml_str(toml_str).expect("parse partial config");

        assert_eq!(config.scoring.low_max, 30);
        assert!(!config.scoring.assess_on_submission);

        // Default values for unspecified fields
        assert_eq!(config.scoring.medium_max, 60);
        assert_eq!(config.engine.broadcast_capacity, 1024);
        assert_eq!(config.lexicon, LexiconConfig::default());
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let toml_str = r#"
            [scoring]
            low_max = 70
            medium_max = 60
        "#;

        let err = EngineConfig::from_toml_str(toml_str).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn zero_channel_capacity_is_rejected() {
        let mut config = EngineConfig::default();
        config.engine.session_channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn lexicon_config_merge_semantics() {
        let mut base = LexiconConfig {
            code_request: vec!["a".to_string()],
            hostile: vec!["b".to_string()],
            interrogative: vec![],
        };
        let other = LexiconConfig {
            code_request: vec!["c".to_string()],
            hostile: vec![],
            interrogative: vec!["d".to_string()],
        };

        base.merge(&other);

        assert_eq!(base.code_request, vec!["a", "c"]);
        assert_eq!(base.hostile, vec!["b"]);
        assert_eq!(base.interrogative, vec!["d"]);
    }
}
