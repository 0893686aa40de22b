//! Per-session risk accumulator.
//!
//! The `SessionAccumulator` owns the running counters of one session and its
//! [`PhaseTracker`]. It is not synchronized: exactly one owner (the session
//! actor in [`crate::engine`]) mutates it. Replayed events are dropped by id so
//! that at-least-once delivery yields the same state as exactly-once.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{EngineError, Result};
use crate::lexicon::{BehaviorTag, BehaviorTags, Lexicon};
use crate::phase::{CognitivePhase, PhaseChange, PhaseSnapshot, PhaseTracker};
use crate::types::{
    EventId, InteractionBody, InteractionEvent, Origin, SessionInfo, SubmissionOutcome,
};

/// Exercise key used when a submission names no exercise.
pub const DEFAULT_EXERCISE: &str = "default";

/// Attempts and passes for one exercise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseTally {
    pub attempts: u32,
    pub passed: u32,
}

impl ExerciseTally {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.passed > 0
    }
}

/// Running aggregate of one session's signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRiskState {
    /// Learner chat messages classified so far.
    pub message_count: u32,
    pub code_request_count: u32,
    pub hostile_language_count: u32,
    pub conceptual_question_count: u32,
    pub hints_used: u32,
    pub attempts_total: u32,
    pub attempts_passed: u32,
    pub time_spent_secs: u64,
    /// Sum of grades over all graded submissions.
    pub grade_total: f64,
    pub exercises: BTreeMap<String, ExerciseTally>,
    pub current_phase: CognitivePhase,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl Default for SessionRiskState {
    fn default() -> Self {
        Self {
            message_count: 0,
            code_request_count: 0,
            hostile_language_count: 0,
            conceptual_question_count: 0,
            hints_used: 0,
            attempts_total: 0,
            attempts_passed: 0,
            time_spent_secs: 0,
            grade_total: 0.0,
            exercises: BTreeMap::new(),
            current_phase: CognitivePhase::Exploration,
            last_event_at: None,
        }
    }
}

impl SessionRiskState {
    /// Mean grade over graded submissions, `None` before the first one.
    #[must_use]
    pub fn average_grade(&self) -> Option<f64> {
        (self.attempts_total > 0).then(|| self.grade_total / f64::from(self.attempts_total))
    }

    fn apply_tags(&mut self, tags: &BehaviorTags) {
        self.message_count = self.message_count.saturating_add(1);
        for tag in tags.iter() {
            let counter = match tag {
                BehaviorTag::CodeRequest => &mut self.code_request_count,
                BehaviorTag::HostileLanguage => &mut self.hostile_language_count,
                BehaviorTag::ConceptualQuestion => &mut self.conceptual_question_count,
            };
            *counter = counter.saturating_add(1);
        }
    }

    fn apply_outcome(&mut self, outcome: &SubmissionOutcome) {
        // Counters saturate on oversized reports.
        self.attempts_total = self.attempts_total.saturating_add(1);
        if outcome.passed {
            self.attempts_passed = self.attempts_passed.saturating_add(1);
        }
        self.hints_used = self.hints_used.saturating_add(outcome.hints_used);
        self.time_spent_secs = self.time_spent_secs.saturating_add(outcome.time_spent_secs);
        if outcome.grade.is_finite() {
            self.grade_total += outcome.grade.max(0.0);
        }

        let key = outcome
            .exercise_id
            .clone()
            .unwrap_or_else(|| DEFAULT_EXERCISE.to_string());
        let tally = self.exercises.entry(key).or_default();
        tally.attempts = tally.attempts.saturating_add(1);
        if outcome.passed {
            tally.passed = tally.passed.saturating_add(1);
        }
    }
}

/// Counters plus phase view of a session at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub info: SessionInfo,
    pub state: SessionRiskState,
    pub phase: PhaseSnapshot,
}

/// Single-writer owner of one session's state.
#[derive(Debug)]
pub struct SessionAccumulator {
    info: SessionInfo,
    lexicon: Arc<Lexicon>,
    state: SessionRiskState,
    tracker: PhaseTracker,
    seen: HashSet<EventId>,
}

impl SessionAccumulator {
    pub fn new(info: SessionInfo, lexicon: Arc<Lexicon>) -> Self {
        let tracker = PhaseTracker::new(info.started_at);
        Self {
            info,
            lexicon,
            state: SessionRiskState::default(),
            tracker,
            seen: HashSet::new(),
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn state(&self) -> &SessionRiskState {
        &self.state
    }

    pub fn tracker(&self) -> &PhaseTracker {
        &self.tracker
    }

    /// Whether an event with this id was already ingested.
    pub fn has_seen(&self, id: &EventId) -> bool {
        self.seen.contains(id)
    }

    /// Fold one interaction into the session.
    ///
    /// Returns the updated state. A replayed event id leaves the state
    /// untouched and returns it as is.
    pub fn ingest(&mut self, event: &InteractionEvent) -> Result<SessionRiskState> {
        if event.session_id.is_empty() {
            return Err(EngineError::MissingSession);
        }
        if event.session_id != self.info.session_id {
            return Err(EngineError::SessionMismatch {
                expected: self.info.session_id.clone(),
                actual: event.session_id.clone(),
            });
        }
        if !self.seen.insert(event.id) {
            trace!(session_id = %self.info.session_id, event_id = %event.id, "Dropping replayed event");
            return Ok(self.state.clone());
        }

        if let (Origin::Learner, InteractionBody::ChatMessage { text }) =
            (event.origin, &event.body)
        {
            let tags = self.lexicon.classify(text);
            self.state.apply_tags(&tags);
            trace!(
                session_id = %self.info.session_id,
                tags = %tags,
                message_count = self.state.message_count,
                "Classified learner message"
            );
        }

        let change = self
            .tracker
            .observe(event.phase_hint, event.new_attempt, event.timestamp);
        self.log_change(change);

        if let Some(outcome) = event.outcome() {
            self.state.apply_outcome(outcome);
            let change = self.tracker.record_outcome(outcome.passed, event.timestamp);
            self.log_change(change);
        }

        self.state.current_phase = self.tracker.current_phase();
        self.state.last_event_at = Some(
            self.state
                .last_event_at
                .map_or(event.timestamp, |prev| prev.max(event.timestamp)),
        );

        Ok(self.state.clone())
    }

    pub fn phase_snapshot(&self) -> PhaseSnapshot {
        self.tracker.snapshot()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            info: self.info.clone(),
            state: self.state.clone(),
            phase: self.tracker.snapshot(),
        }
    }

    fn log_change(&self, change: PhaseChange) {
        if let PhaseChange::Entered { from, to, entry } = change {
            trace!(session_id = %self.info.session_id, %from, %to, ?entry, "Phase changed");
        }
    }
}
