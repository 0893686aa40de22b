//! tutorlens-core: Learning-risk analytics for AI tutoring sessions
//!
//! This crate turns the raw interaction stream of tutoring sessions into
//! per-session risk assessments and course-level analytics:
//!
//! - **Lexicon** - [`Lexicon`] tags each learner message as a code request,
//!   hostile language or a conceptual question
//! - **Phase tracking** - [`PhaseTracker`] follows the learner through seven
//!   ordered [`CognitivePhase`]s
//! - **Accumulation** - [`SessionAccumulator`] folds events into a
//!   [`SessionRiskState`], dropping replayed event ids
//! - **Scoring** - [`RiskScorer`] produces a [`RiskAssessment`]
//! - **Analytics** - [`aggregate_course`] and [`aggregate_student`] roll up
//!   logged [`AssessmentRecord`]s
//! - **Engine** - [`RiskEngine`] runs one actor per session
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tutorlens_core::{
//!     EngineConfig, ExerciseMetrics, InMemoryAssessmentLog, InteractionEvent, RiskEngine,
//!     SessionInfo,
//! };
//!
//! async fn example() -> tutorlens_core::Result<()> {
//!     let engine = RiskEngine::new(EngineConfig::default(), Arc::new(InMemoryAssessmentLog::new()));
//!     engine.open_session(SessionInfo::new("sess-1", "alice", "cs101")).await?;
//!     engine
//!         .ingest(InteractionEvent::learner_message("sess-1", "just give me the code"))
//!         .await?;
//!
//!     let assessment = engine
//!         .finalize(&"sess-1".into(), &ExerciseMetrics::new(0.5, 2.0, 30.0))
//!         .await?;
//!     println!("{} risk ({})", assessment.level, assessment.dimension);
//!     Ok(())
//! }
//! ```

pub mod accumulator;
pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod lexicon;
pub mod log;
pub mod phase;
pub mod scoring;
pub mod types;

pub use accumulator::{ExerciseTally, SessionAccumulator, SessionRiskState, SessionSnapshot};
pub use analytics::{
    CourseAnalytics, ProgressStatus, RiskTrend, StudentRiskProfile, StudentRiskSummary,
    aggregate_course, aggregate_student,
};
pub use config::{EngineConfig, LexiconConfig, RuntimeConfig, ScoringConfig};
pub use engine::RiskEngine;
pub use error::{EngineError, Result};
pub use lexicon::{BehaviorTag, BehaviorTags, Lexicon, TagMatch};
pub use log::{AssessmentLog, AssessmentRecord, AssessmentTrigger, InMemoryAssessmentLog};
pub use phase::{
    CognitivePhase, PhaseChange, PhaseDuration, PhaseEntry, PhaseNote, PhaseRecord,
    PhaseSnapshot, PhaseTracker, TransitionCheck, validate_transition,
};
pub use scoring::{ExerciseMetrics, RiskAssessment, RiskDimension, RiskLevel, RiskScorer};
pub use types::*;
