//! Risk engine: session registry, scoring and assessment publishing.
//!
//! The `RiskEngine` routes every interaction to the actor owning its session,
//! scores sessions on submission, finalization or audit, and appends the
//! resulting [`AssessmentRecord`]s to an [`AssessmentLog`]. Course and student
//! analytics read from the log and never wait on session actors.

mod session;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, info, trace};

use crate::accumulator::{SessionRiskState, SessionSnapshot};
use crate::analytics::{self, CourseAnalytics, StudentRiskProfile};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::lexicon::Lexicon;
use crate::log::{AssessmentLog, AssessmentRecord, AssessmentTrigger};
use crate::phase::PhaseSnapshot;
use crate::scoring::{ExerciseMetrics, RiskAssessment, RiskScorer};
use crate::types::{CourseId, InteractionEvent, SessionId, SessionInfo, StudentId};

use session::SessionHandle;

/// Concurrent risk engine over many tutoring sessions.
pub struct RiskEngine {
    config: EngineConfig,
    lexicon: Arc<Lexicon>,
    scorer: RiskScorer,
    log: Arc<dyn AssessmentLog>,
    /// Open sessions indexed by id
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    broadcast_tx: broadcast::Sender<AssessmentRecord>,
}

impl RiskEngine {
    /// Create an engine that appends assessments to `log`.
    pub fn new(config: EngineConfig, log: Arc<dyn AssessmentLog>) -> Self {
        let lexicon = Arc::new(Lexicon::from_config(&config.lexicon));
        let scorer = RiskScorer::new(config.scoring.clone());
        let (broadcast_tx, _) = broadcast::channel(config.engine.broadcast_capacity.max(1));
        debug!(?lexicon, "Risk engine created");

        Self {
            config,
            lexicon,
            scorer,
            log,
            sessions: RwLock::new(HashMap::new()),
            broadcast_tx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Register a session and start its actor.
    ///
    /// Re-opening with the same student and course is a no-op. Re-opening
    /// with a different owner fails with [`EngineError::SessionConflict`].
    pub async fn open_session(&self, info: SessionInfo) -> Result<()> {
        if info.session_id.is_empty() {
            return Err(EngineError::MissingSession);
        }

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&info.session_id) {
            if existing.info().same_owner(&info) {
                trace!(session_id = %info.session_id, "Session already open");
                return Ok(());
            }
            return Err(EngineError::SessionConflict(info.session_id));
        }

        info!(
            session_id = %info.session_id,
            student_id = %info.student_id,
            course_id = %info.course_id,
            "Opening session"
        );
        let handle = SessionHandle::spawn(
            info.clone(),
            self.lexicon.clone(),
            self.config.engine.session_channel_capacity,
        );
        sessions.insert(info.session_id, handle);
        Ok(())
    }

    /// Feed one interaction to its session.
    ///
    /// With `scoring.assess_on_submission` enabled, a fresh graded submission
    /// also produces an assessment scored against the session's own metrics.
    pub async fn ingest(&self, event: InteractionEvent) -> Result<SessionRiskState> {
        let handle = self.handle(&event.session_id).await?;
        let graded = event.outcome().is_some();

        let ingested = handle.ingest(event).await?;
        if graded && ingested.fresh && self.config.scoring.assess_on_submission {
            let metrics = ExerciseMetrics::observed(&ingested.state);
            self.assess(
                handle.info(),
                &ingested.state,
                &metrics,
                AssessmentTrigger::Submission,
            )
            .await;
        }
        Ok(ingested.state)
    }

    /// Score a session at its end. The session stays open.
    pub async fn finalize(
        &self,
        session_id: &SessionId,
        metrics: &ExerciseMetrics,
    ) -> Result<RiskAssessment> {
        self.score_session(session_id, metrics, AssessmentTrigger::SessionEnd)
            .await
    }

    /// Score a session on request.
    pub async fn audit(
        &self,
        session_id: &SessionId,
        metrics: &ExerciseMetrics,
    ) -> Result<RiskAssessment> {
        self.score_session(session_id, metrics, AssessmentTrigger::Audit)
            .await
    }

    pub async fn phase_snapshot(&self, session_id: &SessionId) -> Result<PhaseSnapshot> {
        self.handle(session_id).await?.phase_snapshot().await
    }

    pub async fn session_state(&self, session_id: &SessionId) -> Result<SessionRiskState> {
        Ok(self.handle(session_id).await?.snapshot().await?.state)
    }

    /// Stop a session's actor and return its final snapshot.
    ///
    /// The snapshot stays scorable with [`RiskScorer`].
    pub async fn close_session(&self, session_id: &SessionId) -> Result<SessionSnapshot> {
        if session_id.is_empty() {
            return Err(EngineError::MissingSession);
        }
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| EngineError::UnknownSession(session_id.clone()))?;

        let snapshot = handle.close().await?;
        debug!(%session_id, messages = snapshot.state.message_count, "Session closed");
        Ok(snapshot)
    }

    pub async fn list_sessions(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn aggregate_course(&self, course_id: &CourseId) -> Result<CourseAnalytics> {
        let records = self.log.read_course(course_id).await?;
        Ok(analytics::aggregate_course(course_id, &records))
    }

    pub async fn aggregate_student(&self, student_id: &StudentId) -> Result<StudentRiskProfile> {
        let records = self.log.read_student(student_id).await?;
        Ok(analytics::aggregate_student(student_id, &records))
    }

    /// Subscribe to assessments produced by this engine.
    pub fn subscribe(&self) -> broadcast::Receiver<AssessmentRecord> {
        self.broadcast_tx.subscribe()
    }

    /// Stop every session actor.
    pub async fn shutdown(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        // Dropping the handles closes each actor's inbox.
        sessions.clear();
        info!(sessions = count, "Risk engine shut down");
    }

    async fn handle(&self, session_id: &SessionId) -> Result<SessionHandle> {
        if session_id.is_empty() {
            return Err(EngineError::MissingSession);
        }
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownSession(session_id.clone()))
    }

    async fn score_session(
        &self,
        session_id: &SessionId,
        metrics: &ExerciseMetrics,
        trigger: AssessmentTrigger,
    ) -> Result<RiskAssessment> {
        let snapshot = self.handle(session_id).await?.snapshot().await?;
        Ok(self
            .assess(&snapshot.info, &snapshot.state, metrics, trigger)
            .await)
    }

    /// Score, append and broadcast. Log failures are reported, not returned.
    async fn assess(
        &self,
        info: &SessionInfo,
        state: &SessionRiskState,
        metrics: &ExerciseMetrics,
        trigger: AssessmentTrigger,
    ) -> RiskAssessment {
        let assessment = self.scorer.score(state, metrics);
        debug!(
            session_id = %info.session_id,
            %trigger,
            score = assessment.score,
            level = %assessment.level,
            dimension = %assessment.dimension,
            "Session assessed"
        );

        let record = AssessmentRecord::new(
            info,
            trigger,
            metrics.completion_rate.unwrap_or(0.0),
            assessment.clone(),
        )
        .with_attempts(state.attempts_total, state.attempts_passed);

        if let Err(e) = self.log.append(record.clone()).await {
            error!(error = %e, session_id = %info.session_id, "Failed to append assessment");
        }
        // No subscribers is fine
        let _ = self.broadcast_tx.send(record);

        assessment
    }
}

impl std::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("config", &self.config)
            .field("lexicon", &self.lexicon)
            .finish_non_exhaustive()
    }
}
