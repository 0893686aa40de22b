//! Assessment log abstraction.
//!
//! Every assessment the engine produces is wrapped in an [`AssessmentRecord`]
//! and appended to an [`AssessmentLog`]. The log is append-only; newer records
//! for the same session supersede older ones when read by analytics.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{EngineError, Result};
use crate::scoring::RiskAssessment;
use crate::types::{AssessmentId, CourseId, SessionId, SessionInfo, StudentId};

/// Why an assessment was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentTrigger {
    /// A graded submission was ingested.
    Submission,
    /// The session was finalized.
    SessionEnd,
    /// Scored on request without ending the session.
    Audit,
}

impl AssessmentTrigger {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::SessionEnd => "session_end",
            Self::Audit => "audit",
        }
    }
}

impl std::fmt::Display for AssessmentTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A risk assessment together with who and what it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: AssessmentId,
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub created_at: DateTime<Utc>,
    pub trigger: AssessmentTrigger,
    /// Completion rate the assessment was scored with, 0.0 when unknown.
    pub completion_rate: f64,
    pub attempts_total: u32,
    pub attempts_passed: u32,
    pub assessment: RiskAssessment,
}

impl AssessmentRecord {
    pub fn new(
        info: &SessionInfo,
        trigger: AssessmentTrigger,
        completion_rate: f64,
        assessment: RiskAssessment,
    ) -> Self {
        Self {
            id: AssessmentId::new(),
            session_id: info.session_id.clone(),
            student_id: info.student_id.clone(),
            course_id: info.course_id.clone(),
            created_at: Utc::now(),
            trigger,
            completion_rate: sanitize_rate(completion_rate),
            attempts_total: 0,
            attempts_passed: 0,
            assessment,
        }
    }

    #[must_use]
    pub fn with_attempts(mut self, total: u32, passed: u32) -> Self {
        self.attempts_total = total;
        self.attempts_passed = passed;
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Whether this record supersedes `other` for display.
    #[must_use]
    pub fn is_newer_than(&self, other: &AssessmentRecord) -> bool {
        (self.created_at, self.id) > (other.created_at, other.id)
    }
}

fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Trait for assessment record storage.
///
/// Implementations must support:
/// - Append-only storage (records are never updated)
/// - Session, student and course scoped queries
/// - Time-range queries
/// - Real-time subscription
#[async_trait]
pub trait AssessmentLog: Send + Sync {
    /// Append a record to the log.
    async fn append(&self, record: AssessmentRecord) -> Result<AssessmentId>;

    /// Read all records for a session, in append order.
    async fn read_session(&self, session_id: &SessionId) -> Result<Vec<AssessmentRecord>>;

    /// Read all records for a student across sessions and courses.
    async fn read_student(&self, student_id: &StudentId) -> Result<Vec<AssessmentRecord>>;

    /// Read all records for a course.
    async fn read_course(&self, course_id: &CourseId) -> Result<Vec<AssessmentRecord>>;

    /// Read records created within `[start, end]`.
    async fn read_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AssessmentRecord>>;

    /// Subscribe to newly appended records.
    fn subscribe(&self) -> broadcast::Receiver<AssessmentRecord>;
}

/// In-memory log backed by a vector.
#[derive(Debug)]
pub struct InMemoryAssessmentLog {
    records: RwLock<Vec<AssessmentRecord>>,
    tx: broadcast::Sender<AssessmentRecord>,
}

impl InMemoryAssessmentLog {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a log whose subscribers buffer up to `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            records: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Number of stored records, counted even if a writer panicked.
    pub fn len(&self) -> usize {
        match self.records.read() {
            Ok(records) => records.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filtered<F>(&self, keep: F) -> Result<Vec<AssessmentRecord>>
    where
        F: Fn(&AssessmentRecord) -> bool,
    {
        let records = self
            .records
            .read()
            .map_err(|e| EngineError::Log(e.to_string()))?;
        Ok(records.iter().filter(|r| keep(r)).cloned().collect())
    }
}

impl Default for InMemoryAssessmentLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssessmentLog for InMemoryAssessmentLog {
    async fn append(&self, record: AssessmentRecord) -> Result<AssessmentId> {
        let id = record.id;
        self.records
            .write()
            .map_err(|e| EngineError::Log(e.to_string()))?
            .push(record.clone());
        // No subscribers is fine
        let _ = self.tx.send(record);
        Ok(id)
    }

    async fn read_session(&self, session_id: &SessionId) -> Result<Vec<AssessmentRecord>> {
        self.filtered(|r| &r.session_id == session_id)
    }

    async fn read_student(&self, student_id: &StudentId) -> Result<Vec<AssessmentRecord>> {
        self.filtered(|r| &r.student_id == student_id)
    }

    async fn read_course(&self, course_id: &CourseId) -> Result<Vec<AssessmentRecord>> {
        self.filtered(|r| &r.course_id == course_id)
    }

    async fn read_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AssessmentRecord>> {
        self.filtered(|r| r.created_at >= start && r.created_at <= end)
    }

    fn subscribe(&self) -> broadcast::Receiver<AssessmentRecord> {
        self.tx.subscribe()
    }
}
