//! Risk scoring over a session's accumulated signals.
//!
//! The [`RiskScorer`] is pure: given a [`SessionRiskState`] and the exercise
//! metrics supplied by the caller it produces a [`RiskAssessment`] with a
//! 0-100 score, a tier, a dominant dimension and human-readable evidence.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::accumulator::SessionRiskState;
use crate::config::ScoringConfig;

/// Exercise-level metrics known to the caller at scoring time.
///
/// Every field is optional. Missing, negative or non-finite values score as
/// zero and add an "insufficient data" line to the evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseMetrics {
    /// Fraction of exercises completed, 0.0 to 1.0.
    #[serde(default)]
    pub completion_rate: Option<f64>,
    /// Mean submissions per exercise.
    #[serde(default)]
    pub average_attempts: Option<f64>,
    /// Minutes of hands-on practice.
    #[serde(default)]
    pub time_spent_minutes: Option<f64>,
}

impl ExerciseMetrics {
    pub fn new(completion_rate: f64, average_attempts: f64, time_spent_minutes: f64) -> Self {
        Self {
            completion_rate: Some(completion_rate),
            average_attempts: Some(average_attempts),
            time_spent_minutes: Some(time_spent_minutes),
        }
    }

    /// Derive metrics from the submissions a session has seen itself.
    ///
    /// Returns all-`None` metrics before the first graded submission.
    pub fn observed(state: &SessionRiskState) -> Self {
        let exercises = state.exercises.len();
        if exercises == 0 {
            return Self::default();
        }
        let completed = state.exercises.values().filter(|t| t.is_completed()).count();
        Self {
            completion_rate: Some(completed as f64 / exercises as f64),
            average_attempts: Some(f64::from(state.attempts_total) / exercises as f64),
            time_spent_minutes: Some(state.time_spent_secs as f64 / 60.0),
        }
    }
}

/// Dominant kind of risk in an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDimension {
    Cognitive,
    Emotional,
    AiDependency,
}

impl RiskDimension {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cognitive => "cognitive",
            Self::Emotional => "emotional",
            Self::AiDependency => "ai_dependency",
        }
    }
}

impl std::fmt::Display for RiskDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of scoring one session. Serialized as a flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub dimension: RiskDimension,
    pub level: RiskLevel,
    /// Composite score, 0 to 100.
    pub score: u8,
    /// Code requests per learner message.
    pub ai_dependency_ratio: f64,
    pub evidence: Vec<String>,
    pub code_requests: u32,
    pub profanity_count: u32,
}

/// Weighted risk scorer.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    config: ScoringConfig,
}

impl RiskScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a session against the given exercise metrics.
    pub fn score(&self, state: &SessionRiskState, metrics: &ExerciseMetrics) -> RiskAssessment {
        let cfg = &self.config;
        let mut evidence = Vec::new();
        let mut gaps = Vec::new();

        let ratio = dependency_ratio(state.code_request_count, state.message_count);
        let completion = sanitize("completion rate", metrics.completion_rate, &mut gaps).min(1.0);
        let attempts = sanitize("average attempts", metrics.average_attempts, &mut gaps);
        let minutes = sanitize("practice time", metrics.time_spent_minutes, &mut gaps);

        let attempts_factor =
            ((attempts - 1.0) / (cfg.saturation_attempts - 1.0)).clamp(0.0, 1.0);
        let completion_factor = 1.0 - completion;
        let time_factor = ((cfg.target_minutes - minutes) / cfg.target_minutes).clamp(0.0, 1.0);

        let composite = cfg.dependency_weight * ratio * 100.0
            + cfg.attempts_weight * attempts_factor * 100.0
            + cfg.completion_weight * completion_factor * 100.0
            + cfg.time_weight * time_factor * 100.0;
        let score = composite.clamp(0.0, 100.0).round() as u8;

        if state.code_request_count > 0 {
            evidence.push(format!(
                "{} direct requests for complete solutions",
                state.code_request_count
            ));
        }
        if state.hostile_language_count > 0 {
            evidence.push(format!(
                "{} expressions of frustration detected",
                state.hostile_language_count
            ));
        }
        if ratio > 0.0 {
            evidence.push(format!(
                "AI dependency ratio of {:.0}% across {} messages",
                ratio * 100.0,
                state.message_count
            ));
        }
        if attempts_factor > 0.0 {
            evidence.push(format!("average of {attempts:.1} attempts per exercise"));
        }
        if completion_factor > 0.0 && metrics.completion_rate.is_some() {
            evidence.push(format!("{:.0}% of exercises completed", completion * 100.0));
        }
        if time_factor > 0.0 && metrics.time_spent_minutes.is_some() {
            evidence.push(format!("only {minutes:.0} minutes of practice"));
        }
        if state.hints_used > 0 {
            evidence.push(format!("{} hints used", state.hints_used));
        }
        let risk_noted = !evidence.is_empty();

        evidence.extend(gaps);
        if state.conceptual_question_count > 0 {
            evidence.push(format!(
                "{} conceptual questions asked",
                state.conceptual_question_count
            ));
        }
        if !risk_noted {
            evidence.push("no risk indicators detected".to_string());
        }

        RiskAssessment {
            dimension: self.dimension_for(state),
            level: self.tier_for(score),
            score,
            ai_dependency_ratio: ratio,
            evidence,
            code_requests: state.code_request_count,
            profanity_count: state.hostile_language_count,
        }
    }

    /// Map an integer score onto a tier.
    #[must_use]
    pub fn tier_for(&self, score: u8) -> RiskLevel {
        if score <= self.config.low_max {
            RiskLevel::Low
        } else if score <= self.config.medium_max {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    /// Pick the dominant dimension. Emotional signals take precedence.
    #[must_use]
    pub fn dimension_for(&self, state: &SessionRiskState) -> RiskDimension {
        if state.hostile_language_count >= self.config.emotional_hostile_threshold {
            RiskDimension::Emotional
        } else if state.code_request_count >= self.config.dependency_code_request_threshold {
            RiskDimension::AiDependency
        } else {
            RiskDimension::Cognitive
        }
    }
}

/// Code requests per message. Zero messages yields zero.
#[must_use]
pub fn dependency_ratio(code_requests: u32, messages: u32) -> f64 {
    f64::from(code_requests) / f64::from(messages.max(1))
}

fn sanitize(name: &str, value: Option<f64>, gaps: &mut Vec<String>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(v) => {
            warn!(metric = name, value = v, "Invalid exercise metric, scoring as zero");
            gaps.push(format!("insufficient data: {name} is invalid"));
            0.0
        }
        None => {
            gaps.push(format!("insufficient data: {name} not provided"));
            0.0
        }
    }
}
