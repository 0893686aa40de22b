//! Session actor.
//!
//! Each open session runs as one tokio task that exclusively owns its
//! [`SessionAccumulator`]. Callers talk to it through a [`SessionHandle`] over
//! a bounded mpsc channel and receive replies on oneshot channels, so events
//! of one session are applied strictly in arrival order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::accumulator::{SessionAccumulator, SessionRiskState, SessionSnapshot};
use crate::error::{EngineError, Result};
use crate::lexicon::Lexicon;
use crate::phase::PhaseSnapshot;
use crate::types::{InteractionEvent, SessionInfo};

/// Result of handing one event to an actor.
#[derive(Debug, Clone)]
pub(crate) struct Ingested {
    pub state: SessionRiskState,
    /// False when the event id was a replay.
    pub fresh: bool,
}

/// Messages accepted by a session actor.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// Boxed to keep the enum small.
    Ingest {
        event: Box<InteractionEvent>,
        reply: oneshot::Sender<Result<Ingested>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Phase {
        reply: oneshot::Sender<PhaseSnapshot>,
    },
    /// Reply with a final snapshot and stop.
    Close {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Cheap, cloneable address of a running session actor.
#[derive(Debug, Clone)]
pub(crate) struct SessionHandle {
    info: SessionInfo,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Spawn the actor for `info` on the current runtime.
    pub fn spawn(info: SessionInfo, lexicon: Arc<Lexicon>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let accumulator = SessionAccumulator::new(info.clone(), lexicon);
        tokio::spawn(run(accumulator, rx));
        Self { info, tx }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub async fn ingest(&self, event: InteractionEvent) -> Result<Ingested> {
        self.request(|reply| SessionCommand::Ingest {
            event: Box::new(event),
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    pub async fn phase_snapshot(&self) -> Result<PhaseSnapshot> {
        self.request(|reply| SessionCommand::Phase { reply }).await
    }

    pub async fn close(&self) -> Result<SessionSnapshot> {
        self.request(|reply| SessionCommand::Close { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| EngineError::SessionClosed(self.info.session_id.clone()))?;
        rx.await
            .map_err(|_| EngineError::SessionClosed(self.info.session_id.clone()))
    }
}

/// Actor loop. Exits on `Close` or once every handle is dropped.
async fn run(mut accumulator: SessionAccumulator, mut rx: mpsc::Receiver<SessionCommand>) {
    let session_id = accumulator.info().session_id.clone();
    debug!(%session_id, "Session actor started");

    while let Some(command) = rx.recv().await {
        match command {
            SessionCommand::Ingest { event, reply } => {
                let fresh = !accumulator.has_seen(&event.id);
                let result = accumulator
                    .ingest(&event)
                    .map(|state| Ingested { state, fresh });
                trace!(%session_id, event_id = %event.id, fresh, "Event applied");
                let _ = reply.send(result);
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(accumulator.snapshot());
            }
            SessionCommand::Phase { reply } => {
                let _ = reply.send(accumulator.phase_snapshot());
            }
            SessionCommand::Close { reply } => {
                let _ = reply.send(accumulator.snapshot());
                break;
            }
        }
    }

    debug!(%session_id, "Session actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubmissionOutcome;

    fn handle() -> SessionHandle {
        let info = SessionInfo::new("sess-1", "alice", "cs101");
        SessionHandle::spawn(info, Arc::new(Lexicon::default()), 8)
    }

    #[tokio::test]
    async fn actor_applies_events_in_order() {
        let handle = handle();
        for text in ["give me the code", "why?", "ok"] {
            handle
                .ingest(InteractionEvent::learner_message("sess-1", text))
                .await
                .unwrap();
        }

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state.message_count, 3);
        assert_eq!(snapshot.state.code_request_count, 1);
        assert_eq!(snapshot.info.student_id.as_str(), "alice");
    }

    #[tokio::test]
    async fn actor_reports_replays() {
        let handle = handle();
        let event = InteractionEvent::submission(
            "sess-1",
            "print(1)",
            Some(SubmissionOutcome::passed(10.0)),
        );

        let first = handle.ingest(event.clone()).await.unwrap();
        let second = handle.ingest(event).await.unwrap();

        assert!(first.fresh);
        assert!(!second.fresh);
        assert_eq!(first.state, second.state);
    }

    #[tokio::test]
    async fn actor_forwards_ingest_errors() {
        let handle = handle();
        let err = handle
            .ingest(InteractionEvent::learner_message("other", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SessionMismatch { .. }));
    }

    #[tokio::test]
    async fn closed_actor_rejects_requests() {
        let handle = handle();
        let last = handle.close().await.unwrap();
        assert_eq!(last.state.message_count, 0);

        let err = handle.phase_snapshot().await.unwrap_err();
        assert!(matches!(err, EngineError::SessionClosed(_)));
    }
}
