//! Cognitive phase tracking for a tutoring session.
//!
//! A learner moves through seven ordered phases while working on an exercise.
//! The [`PhaseTracker`] is the per-session state machine that follows them.
//!
//! ## State Machine
//!
//! ```text
//! exploration → decomposition → planning → implementation → debugging → validation → reflection
//!      ▲                                                        ▲  │          │
//!      │ new attempt (reset)                 failed submission  └──┴──────────┘
//!      └───────────────────────────────── from any phase        (regression)
//! ```
//!
//! - Hints may move forward by any number of steps; backward hints are kept as
//!   [`PhaseNote`]s and leave the current phase unchanged.
//! - A passed submission jumps to `validation`, then `reflection`.
//! - A failed submission advances or regresses to `debugging`.
//! - A new attempt resets to `exploration` and keeps the full history.
//!
//! Time windows are bounded by the timestamps passed in; the tracker never reads
//! the wall clock.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One of the seven ordered phases of the cognitive journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CognitivePhase {
    Exploration,
    Decomposition,
    Planning,
    Implementation,
    Debugging,
    Validation,
    Reflection,
}

impl CognitivePhase {
    /// All phases in journey order.
    pub const ALL: [CognitivePhase; 7] = [
        Self::Exploration,
        Self::Decomposition,
        Self::Planning,
        Self::Implementation,
        Self::Debugging,
        Self::Validation,
        Self::Reflection,
    ];

    /// Position in the journey, starting at 0.
    #[must_use]
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Exploration => 0,
            Self::Decomposition => 1,
            Self::Planning => 2,
            Self::Implementation => 3,
            Self::Debugging => 4,
            Self::Validation => 5,
            Self::Reflection => 6,
        }
    }

    #[must_use]
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }

    /// The phase one step ahead, `None` at `reflection`.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        Self::from_ordinal(self.ordinal() + 1)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reflection)
    }

    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exploration => "exploration",
            Self::Decomposition => "decomposition",
            Self::Planning => "planning",
            Self::Implementation => "implementation",
            Self::Debugging => "debugging",
            Self::Validation => "validation",
            Self::Reflection => "reflection",
        }
    }
}

impl std::fmt::Display for CognitivePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CognitivePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| format!("unknown cognitive phase: {s}"))
    }
}

/// Classification of a requested move between two phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// Target is later in the journey.
    Advance,
    /// Target is the current phase.
    Hold,
    /// Target is earlier in the journey.
    Regression,
}

/// Validate a move from one phase to another.
#[must_use]
pub fn validate_transition(from: CognitivePhase, to: CognitivePhase) -> TransitionCheck {
    match to.ordinal().cmp(&from.ordinal()) {
        std::cmp::Ordering::Greater => TransitionCheck::Advance,
        std::cmp::Ordering::Equal => TransitionCheck::Hold,
        std::cmp::Ordering::Less => TransitionCheck::Regression,
    }
}

/// Why a phase was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEntry {
    /// Session start.
    Initial,
    /// Phase hint attached by the tutoring collaborator.
    Hint,
    /// Submission outcome moved the learner forward.
    Outcome,
    /// Failed submission sent the learner back to debugging.
    Regression,
    /// New exercise attempt.
    Reset,
}

/// One window spent in a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: CognitivePhase,
    pub entered_at: DateTime<Utc>,
    /// `None` while this is the current phase.
    pub left_at: Option<DateTime<Utc>>,
    /// Exercise attempt number, starting at 1.
    pub attempt: u32,
    pub entry: PhaseEntry,
}

impl PhaseRecord {
    /// Length of the window, with an open window closed at `until`.
    #[must_use]
    pub fn duration_until(&self, until: DateTime<Utc>) -> Duration {
        let end = self.left_at.unwrap_or(until);
        (end - self.entered_at).max(Duration::zero())
    }
}

/// A backward hint that was recorded but not applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseNote {
    pub at: DateTime<Utc>,
    pub hinted: CognitivePhase,
    pub current: CognitivePhase,
    pub attempt: u32,
}

/// Effect of feeding a signal to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseChange {
    /// Current phase did not change.
    Unchanged,
    /// A new window was opened.
    Entered {
        from: CognitivePhase,
        to: CognitivePhase,
        entry: PhaseEntry,
    },
    /// A backward hint was noted.
    Noted(PhaseNote),
}

/// Time spent in one phase across all its windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDuration {
    pub phase: CognitivePhase,
    pub seconds: i64,
}

/// Point-in-time view of a tracker, shaped for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    pub current: CognitivePhase,
    pub attempt: u32,
    pub history: Vec<PhaseRecord>,
    pub notes: Vec<PhaseNote>,
    pub durations: Vec<PhaseDuration>,
    pub total_elapsed_secs: i64,
}

/// Per-session cognitive phase state machine.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    started_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    attempt: u32,
    history: Vec<PhaseRecord>,
    notes: Vec<PhaseNote>,
}

impl PhaseTracker {
    /// Start in `exploration` at `started_at`.
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            last_seen: started_at,
            attempt: 1,
            history: vec![PhaseRecord {
                phase: CognitivePhase::Exploration,
                entered_at: started_at,
                left_at: None,
                attempt: 1,
                entry: PhaseEntry::Initial,
            }],
            notes: Vec::new(),
        }
    }

    pub fn current_phase(&self) -> CognitivePhase {
        self.history
            .last()
            .map(|r| r.phase)
            .unwrap_or(CognitivePhase::Exploration)
    }

    /// Every window since the session started, across attempts.
    pub fn history(&self) -> &[PhaseRecord] {
        &self.history
    }

    /// Backward hints that were not applied.
    pub fn notes(&self) -> &[PhaseNote] {
        &self.notes
    }

    /// Current exercise attempt number.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Apply an interaction's phase hint and reset signal.
    pub fn observe(
        &mut self,
        hint: Option<CognitivePhase>,
        new_attempt: bool,
        at: DateTime<Utc>,
    ) -> PhaseChange {
        self.touch(at);

        let mut change = PhaseChange::Unchanged;
        if new_attempt {
            change = self.reset(at);
        }

        let Some(hinted) = hint else {
            return change;
        };

        let current = self.current_phase();
        match validate_transition(current, hinted) {
            TransitionCheck::Advance => self.enter(hinted, PhaseEntry::Hint, at),
            TransitionCheck::Hold => change,
            TransitionCheck::Regression => {
                let note = PhaseNote {
                    at,
                    hinted,
                    current,
                    attempt: self.attempt,
                };
                debug!(%hinted, %current, "Backward phase hint noted");
                self.notes.push(note.clone());
                PhaseChange::Noted(note)
            }
        }
    }

    /// Apply a submission outcome.
    pub fn record_outcome(&mut self, passed: bool, at: DateTime<Utc>) -> PhaseChange {
        self.touch(at);

        let current = self.current_phase();
        let target = if passed {
            match current {
                CognitivePhase::Reflection => return PhaseChange::Unchanged,
                CognitivePhase::Validation => CognitivePhase::Reflection,
                _ => CognitivePhase::Validation,
            }
        } else {
            CognitivePhase::Debugging
        };

        match validate_transition(current, target) {
            TransitionCheck::Advance => self.enter(target, PhaseEntry::Outcome, at),
            TransitionCheck::Hold => PhaseChange::Unchanged,
            TransitionCheck::Regression => self.enter(target, PhaseEntry::Regression, at),
        }
    }

    /// Start a new exercise attempt back in `exploration`.
    pub fn reset(&mut self, at: DateTime<Utc>) -> PhaseChange {
        self.touch(at);
        self.attempt = self.attempt.saturating_add(1);
        self.enter(CognitivePhase::Exploration, PhaseEntry::Reset, at)
    }

    /// Total time per visited phase, in journey order.
    ///
    /// The open window is measured up to the latest observed timestamp.
    pub fn duration_per_phase(&self) -> Vec<PhaseDuration> {
        CognitivePhase::ALL
            .iter()
            .filter_map(|phase| {
                let windows: Vec<_> = self.history.iter().filter(|r| r.phase == *phase).collect();
                if windows.is_empty() {
                    return None;
                }
                let total = windows
                    .iter()
                    .fold(Duration::zero(), |acc, r| acc + r.duration_until(self.last_seen));
                Some(PhaseDuration {
                    phase: *phase,
                    seconds: total.num_seconds(),
                })
            })
            .collect()
    }

    /// Time from session start to the latest observed timestamp.
    pub fn total_elapsed(&self) -> Duration {
        (self.last_seen - self.started_at).max(Duration::zero())
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        PhaseSnapshot {
            current: self.current_phase(),
            attempt: self.attempt,
            history: self.history.clone(),
            notes: self.notes.clone(),
            durations: self.duration_per_phase(),
            total_elapsed_secs: self.total_elapsed().num_seconds(),
        }
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_seen {
            self.last_seen = at;
        }
    }

    fn enter(&mut self, phase: CognitivePhase, entry: PhaseEntry, at: DateTime<Utc>) -> PhaseChange {
        let attempt = self.attempt;
        let from = self.current_phase();
        let mut boundary = at;
        if let Some(last) = self.history.last_mut() {
            // Out-of-order timestamps never produce a negative window.
            boundary = at.max(last.entered_at);
            last.left_at = Some(boundary);
        }

        self.history.push(PhaseRecord {
            phase,
            entered_at: boundary,
            left_at: None,
            attempt,
            entry,
        });
        debug!(%from, to = %phase, ?entry, attempt, "Cognitive phase entered");

        PhaseChange::Entered {
            from,
            to: phase,
            entry,
        }
    }
}
