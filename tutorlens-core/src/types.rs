//! Identifier and interaction event types.
//!
//! `InteractionEvent` is the only input the engine accepts from the tutoring
//! collaborator. Its body is a closed, tagged set of variants so that
//! framework-specific payload shapes never leak into the engine.
//!
//! ## Wire defaults
//!
//! Producers should send `id` and `timestamp` with every event. When
//! deserialized without them, an event gets a fresh [`EventId`] and the
//! current wall-clock time. An id-less event therefore cannot be recognised
//! as a replay, and its timestamp reflects when it was parsed, not when it
//! happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phase::CognitivePhase;

/// UUIDv7 wrapper for time-ordered interaction event IDs.
///
/// Event ids are the deduplication key for at-least-once delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new time-ordered event ID using UUIDv7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UUIDv7 wrapper for assessment record IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssessmentId(Uuid);

impl AssessmentId {
    /// Create a new time-ordered assessment ID using UUIDv7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AssessmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AssessmentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for AssessmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is blank.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// String wrapper for tutoring session identifiers.
    SessionId
);
string_id!(
    /// String wrapper for student identifiers.
    StudentId
);
string_id!(
    /// String wrapper for course identifiers.
    CourseId
);

/// Who produced an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Learner,
    Tutor,
}

/// Discriminant of an interaction body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    ChatMessage,
    CodeSubmission,
    GovernanceNote,
}

impl InteractionKind {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatMessage => "chat_message",
            Self::CodeSubmission => "code_submission",
            Self::GovernanceNote => "governance_note",
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of running a learner's code submission against an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Whether the submission passed validation.
    pub passed: bool,
    /// Grade assigned by the grader (0.0 to 10.0 by convention).
    #[serde(default)]
    pub grade: f64,
    /// Hints consumed before this submission.
    #[serde(default)]
    pub hints_used: u32,
    /// Time spent on the attempt, in seconds.
    #[serde(default)]
    pub time_spent_secs: u64,
    /// Exercise the submission belongs to.
    #[serde(default)]
    pub exercise_id: Option<String>,
}

impl SubmissionOutcome {
    /// A passing outcome with no hints and no recorded time.
    #[must_use]
    pub fn passed(grade: f64) -> Self {
        Self {
            passed: true,
            grade,
            hints_used: 0,
            time_spent_secs: 0,
            exercise_id: None,
        }
    }

    /// A failing outcome with no hints and no recorded time.
    #[must_use]
    pub fn failed(grade: f64) -> Self {
        Self {
            passed: false,
            ..Self::passed(grade)
        }
    }

    #[must_use]
    pub fn with_exercise(mut self, exercise_id: impl Into<String>) -> Self {
        self.exercise_id = Some(exercise_id.into());
        self
    }

    #[must_use]
    pub fn with_hints(mut self, hints_used: u32) -> Self {
        self.hints_used = hints_used;
        self
    }

    #[must_use]
    pub fn with_time_spent_secs(mut self, secs: u64) -> Self {
        self.time_spent_secs = secs;
        self
    }
}

/// Body of an interaction, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionBody {
    /// Free-form chat text.
    ChatMessage { text: String },
    /// Code sent for evaluation, with the grader's outcome when known.
    CodeSubmission {
        code: String,
        #[serde(default)]
        outcome: Option<SubmissionOutcome>,
    },
    /// Note emitted by the governance layer (moderation, policy reminders).
    GovernanceNote { text: String },
}

/// One unit of communication inside a tutoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// Unique id; duplicates are dropped on ingestion. Minted on parse when absent.
    #[serde(default)]
    pub id: EventId,
    pub session_id: SessionId,
    /// When the interaction happened. Parse time when absent.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub origin: Origin,
    #[serde(flatten)]
    pub body: InteractionBody,
    /// Phase the tutoring collaborator attached to this interaction.
    #[serde(default)]
    pub phase_hint: Option<CognitivePhase>,
    /// Reset signal: the learner started a new exercise attempt.
    #[serde(default)]
    pub new_attempt: bool,
}

impl InteractionEvent {
    fn new(session_id: impl Into<SessionId>, origin: Origin, body: InteractionBody) -> Self {
        Self {
            id: EventId::new(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            origin,
            body,
            phase_hint: None,
            new_attempt: false,
        }
    }

    /// A chat message written by the learner.
    pub fn learner_message(session_id: impl Into<SessionId>, text: impl Into<String>) -> Self {
        Self::new(
            session_id,
            Origin::Learner,
            InteractionBody::ChatMessage { text: text.into() },
        )
    }

    /// A chat message written by the tutor.
    pub fn tutor_message(session_id: impl Into<SessionId>, text: impl Into<String>) -> Self {
        Self::new(
            session_id,
            Origin::Tutor,
            InteractionBody::ChatMessage { text: text.into() },
        )
    }

    /// A learner code submission.
    pub fn submission(
        session_id: impl Into<SessionId>,
        code: impl Into<String>,
        outcome: Option<SubmissionOutcome>,
    ) -> Self {
        Self::new(
            session_id,
            Origin::Learner,
            InteractionBody::CodeSubmission {
                code: code.into(),
                outcome,
            },
        )
    }

    /// A governance note attached by the tutor side.
    pub fn governance_note(session_id: impl Into<SessionId>, text: impl Into<String>) -> Self {
        Self::new(
            session_id,
            Origin::Tutor,
            InteractionBody::GovernanceNote { text: text.into() },
        )
    }

    #[must_use]
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_phase_hint(mut self, phase: CognitivePhase) -> Self {
        self.phase_hint = Some(phase);
        self
    }

    #[must_use]
    pub fn as_new_attempt(mut self) -> Self {
        self.new_attempt = true;
        self
    }

    /// The kind of this interaction.
    #[must_use]
    pub fn kind(&self) -> InteractionKind {
        match self.body {
            InteractionBody::ChatMessage { .. } => InteractionKind::ChatMessage,
            InteractionBody::CodeSubmission { .. } => InteractionKind::CodeSubmission,
            InteractionBody::GovernanceNote { .. } => InteractionKind::GovernanceNote,
        }
    }

    /// The text or code carried by this interaction.
    #[must_use]
    pub fn text_or_code(&self) -> &str {
        match &self.body {
            InteractionBody::ChatMessage { text } | InteractionBody::GovernanceNote { text } => {
                text
            }
            InteractionBody::CodeSubmission { code, .. } => code,
        }
    }

    /// The submission outcome, if this is a graded code submission.
    #[must_use]
    pub fn outcome(&self) -> Option<&SubmissionOutcome> {
        match &self.body {
            InteractionBody::CodeSubmission { outcome, .. } => outcome.as_ref(),
            _ => None,
        }
    }
}

/// Registration of a tutoring session with the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    #[serde(default = "Utc::now")]
    pub started_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn new(
        session_id: impl Into<SessionId>,
        student_id: impl Into<StudentId>,
        course_id: impl Into<CourseId>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            student_id: student_id.into(),
            course_id: course_id.into(),
            started_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Whether another registration names the same owner.
    #[must_use]
    pub fn same_owner(&self, other: &SessionInfo) -> bool {
        self.student_id == other.student_id && self.course_id == other.course_id
    }
}
