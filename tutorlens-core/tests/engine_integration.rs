//! End-to-end tests for the risk engine
//!
//! These drive realistic sessions through `RiskEngine` and check the
//! resulting assessments, phase history and course analytics.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use tutorlens_core::{
    AssessmentLog, AssessmentTrigger, CognitivePhase, EngineConfig, EngineError, ExerciseMetrics,
    InMemoryAssessmentLog, InteractionEvent, PhaseEntry, RiskDimension, RiskEngine, RiskLevel,
    SessionInfo, SubmissionOutcome,
};

fn create_engine() -> (RiskEngine, Arc<InMemoryAssessmentLog>) {
    let log = Arc::new(InMemoryAssessmentLog::new());
    let engine = RiskEngine::new(EngineConfig::default(), log.clone());
    (engine, log)
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 15, minute, 0).unwrap()
}

async fn say(engine: &RiskEngine, session: &str, text: &str) {
    engine
        .ingest(InteractionEvent::learner_message(session, text))
        .await
        .unwrap();
}

/// 15 messages, 10 of them code requests, two failed exercises.
async fn play_dependent_learner(engine: &RiskEngine, session: &str) {
    let requests = [
        "give me the code",
        "just give me the answer",
        "dame el código",
        "write the solution",
        "do it for me",
        "hazme la tarea",
        "show me the solution",
        "pásame el código",
        "dame la respuesta",
        "send me the code",
    ];
    for text in requests {
        say(engine, session, text).await;
    }
    for text in ["ok", "I see", "let me try", "hmm", "thanks"] {
        say(engine, session, text).await;
    }
    for exercise in ["ex-1", "ex-2"] {
        engine
            .ingest(InteractionEvent::submission(
                session,
                "pass",
                Some(SubmissionOutcome::failed(2.0).with_exercise(exercise)),
            ))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn dependent_learner_is_flagged_high_ai_dependency() {
    let (engine, log) = create_engine();
    engine
        .open_session(SessionInfo::new("a", "ana", "cs101"))
        .await
        .unwrap();

    play_dependent_learner(&engine, "a").await;

    let state = engine.session_state(&"a".into()).await.unwrap();
    assert_eq!(state.message_count, 15);
    assert_eq!(state.code_request_count, 10);
    assert_eq!(state.exercises.len(), 2);

    let assessment = engine
        .finalize(&"a".into(), &ExerciseMetrics::new(0.2, 4.0, 15.0))
        .await
        .unwrap();

    assert!((assessment.ai_dependency_ratio - 0.67).abs() < 0.01);
    assert_eq!(assessment.dimension, RiskDimension::AiDependency);
    assert_eq!(assessment.level, RiskLevel::High);
    assert_eq!(assessment.code_requests, 10);

    // Scored on the session's own tallies (no passes, one attempt each, no
    // practice time reported), the last submission only reaches medium.
    let records = log.read_session(&"a".into()).await.unwrap();
    let submission = records
        .iter()
        .rev()
        .find(|r| r.trigger == AssessmentTrigger::Submission)
        .unwrap();
    assert_eq!(submission.assessment.score, 57);
    assert_eq!(submission.assessment.level, RiskLevel::Medium);
    assert_eq!(submission.assessment.dimension, RiskDimension::AiDependency);
}

#[tokio::test]
async fn autonomous_learner_is_low_cognitive() {
    let (engine, _) = create_engine();
    engine
        .open_session(SessionInfo::new("b", "ben", "cs101"))
        .await
        .unwrap();

    for text in [
        "Why does my loop never end?",
        "¿Cómo funciona la recursión?",
        "What is a closure?",
    ] {
        say(&engine, "b", text).await;
    }
    for i in 1..=5 {
        engine
            .ingest(InteractionEvent::submission(
                "b",
                "solution",
                Some(
                    SubmissionOutcome::passed(10.0)
                        .with_exercise(format!("ex-{i}"))
                        .with_time_spent_secs(18 * 60),
                ),
            ))
            .await
            .unwrap();
    }

    let state = engine.session_state(&"b".into()).await.unwrap();
    assert_eq!(state.conceptual_question_count, 3);
    assert_eq!(ExerciseMetrics::observed(&state), ExerciseMetrics::new(1.0, 1.0, 90.0));

    let assessment = engine
        .finalize(&"b".into(), &ExerciseMetrics::new(1.0, 1.0, 90.0))
        .await
        .unwrap();

    assert_eq!(assessment.score, 0);
    assert_eq!(assessment.level, RiskLevel::Low);
    assert_eq!(assessment.dimension, RiskDimension::Cognitive);
}

#[tokio::test]
async fn frustrated_learner_is_emotional() {
    let (engine, _) = create_engine();
    engine
        .open_session(SessionInfo::new("c", "cai", "cs101"))
        .await
        .unwrap();

    for text in [
        "this is stupid",
        "damn, nothing works",
        "give me the code",
        "ok",
        "trying again",
        "still failing",
        "let me check",
        "done",
    ] {
        say(&engine, "c", text).await;
    }

    let assessment = engine
        .audit(&"c".into(), &ExerciseMetrics::new(0.5, 2.0, 30.0))
        .await
        .unwrap();

    assert_eq!(assessment.dimension, RiskDimension::Emotional);
    assert_eq!(assessment.profanity_count, 2);
    assert_eq!(assessment.code_requests, 1);
}

#[tokio::test]
async fn replayed_events_do_not_change_state() {
    let (engine, log) = create_engine();
    engine
        .open_session(SessionInfo::new("s", "dee", "cs101"))
        .await
        .unwrap();

    let events = vec![
        InteractionEvent::learner_message("s", "give me the code"),
        InteractionEvent::learner_message("s", "why?"),
        InteractionEvent::submission(
            "s",
            "x",
            Some(SubmissionOutcome::failed(1.0).with_hints(2)),
        ),
    ];

    let mut first_pass = None;
    for event in &events {
        first_pass = Some(engine.ingest(event.clone()).await.unwrap());
    }
    let records_after_first = log.len();

    let mut second_pass = None;
    for event in &events {
        second_pass = Some(engine.ingest(event.clone()).await.unwrap());
    }

    assert_eq!(first_pass, second_pass);
    assert_eq!(log.len(), records_after_first);
    let state = engine.session_state(&"s".into()).await.unwrap();
    assert_eq!(state.message_count, 2);
    assert_eq!(state.hints_used, 2);
}

#[tokio::test]
async fn phase_history_follows_hints_outcomes_and_resets() {
    let (engine, _) = create_engine();
    engine
        .open_session(SessionInfo::new("p", "eve", "cs101").with_started_at(at(0)))
        .await
        .unwrap();

    let events = vec![
        InteractionEvent::tutor_message("p", "Break it down")
            .with_phase_hint(CognitivePhase::Decomposition)
            .with_timestamp(at(2)),
        InteractionEvent::learner_message("p", "back to basics")
            .with_phase_hint(CognitivePhase::Exploration)
            .with_timestamp(at(3)),
        InteractionEvent::tutor_message("p", "Now code it")
            .with_phase_hint(CognitivePhase::Implementation)
            .with_timestamp(at(5)),
        InteractionEvent::submission("p", "v1", Some(SubmissionOutcome::passed(8.0)))
            .with_timestamp(at(10)),
        InteractionEvent::submission("p", "v2", Some(SubmissionOutcome::failed(4.0)))
            .with_timestamp(at(12)),
        InteractionEvent::learner_message("p", "next exercise")
            .as_new_attempt()
            .with_timestamp(at(20)),
    ];
    for event in events {
        engine.ingest(event).await.unwrap();
    }

    let snapshot = engine.phase_snapshot(&"p".into()).await.unwrap();
    let phases: Vec<_> = snapshot.history.iter().map(|r| r.phase).collect();
    assert_eq!(
        phases,
        vec![
            CognitivePhase::Exploration,
            CognitivePhase::Decomposition,
            CognitivePhase::Implementation,
            CognitivePhase::Validation,
            CognitivePhase::Debugging,
            CognitivePhase::Exploration,
        ]
    );
    assert_eq!(snapshot.current, CognitivePhase::Exploration);
    assert_eq!(snapshot.attempt, 2);
    assert_eq!(snapshot.notes.len(), 1);
    assert_eq!(snapshot.total_elapsed_secs, 20 * 60);

    for pair in snapshot.history.windows(2) {
        let allowed = matches!(pair[1].entry, PhaseEntry::Reset | PhaseEntry::Regression);
        assert!(allowed || pair[1].phase.ordinal() >= pair[0].phase.ordinal());
        assert_eq!(pair[0].left_at, Some(pair[1].entered_at));
    }
    let total: i64 = snapshot.durations.iter().map(|d| d.seconds).sum();
    assert_eq!(total, snapshot.total_elapsed_secs);
}

#[tokio::test]
async fn course_analytics_read_latest_assessments() {
    let (engine, _) = create_engine();
    for (session, student) in [("a", "ana"), ("b", "ben"), ("c", "cai")] {
        engine
            .open_session(SessionInfo::new(session, student, "cs101"))
            .await
            .unwrap();
    }
    play_dependent_learner(&engine, "a").await;
    say(&engine, "b", "What is a closure?").await;
    say(&engine, "c", "this is stupid").await;

    engine
        .finalize(&"a".into(), &ExerciseMetrics::new(0.2, 4.0, 15.0))
        .await
        .unwrap();
    engine
        .finalize(&"b".into(), &ExerciseMetrics::new(1.0, 1.0, 90.0))
        .await
        .unwrap();
    engine
        .finalize(&"c".into(), &ExerciseMetrics::new(0.5, 2.0, 30.0))
        .await
        .unwrap();

    let analytics = engine.aggregate_course(&"cs101".into()).await.unwrap();

    assert_eq!(analytics.total_students, 3);
    assert_eq!(analytics.total_students, analytics.students.len());
    assert_eq!(analytics.students_at_risk, 1);
    assert_eq!(analytics.students[0].student_id.as_str(), "ana");
    assert_eq!(analytics.students[2].student_id.as_str(), "ben");
    assert!((0.0..=100.0).contains(&analytics.average_risk));
    assert!((analytics.completion_rate - (0.2 + 1.0 + 0.5) / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn empty_course_yields_zeroed_analytics() {
    let (engine, _) = create_engine();

    let analytics = engine.aggregate_course(&"ghost".into()).await.unwrap();

    assert_eq!(analytics.total_students, 0);
    assert_eq!(analytics.average_risk, 0.0);
    assert_eq!(analytics.students_at_risk, 0);
    assert_eq!(analytics.completion_rate, 0.0);
    assert!(analytics.students.is_empty());
}

#[tokio::test]
async fn student_profile_spans_sessions() {
    let (engine, log) = create_engine();
    engine
        .open_session(SessionInfo::new("a1", "ana", "cs101"))
        .await
        .unwrap();
    engine
        .open_session(SessionInfo::new("a2", "ana", "cs102"))
        .await
        .unwrap();

    play_dependent_learner(&engine, "a1").await;
    engine
        .finalize(&"a1".into(), &ExerciseMetrics::new(0.2, 4.0, 15.0))
        .await
        .unwrap();
    say(&engine, "a2", "why does this work?").await;
    engine
        .finalize(&"a2".into(), &ExerciseMetrics::new(1.0, 1.0, 75.0))
        .await
        .unwrap();

    let profile = engine.aggregate_student(&"ana".into()).await.unwrap();

    assert_eq!(profile.sessions, 2);
    assert_eq!(profile.latest_score, Some(0));
    assert_eq!(profile.trend, tutorlens_core::RiskTrend::Improving);
    assert_eq!(profile.status, tutorlens_core::ProgressStatus::Completed);
    assert_eq!(profile.attempts_total, 2);

    let records = log.read_student(&"ana".into()).await.unwrap();
    assert!(
        records
            .iter()
            .any(|r| r.trigger == AssessmentTrigger::Submission)
    );
}

#[tokio::test]
async fn events_for_unopened_sessions_are_rejected() {
    let (engine, _) = create_engine();

    let err = engine
        .ingest(InteractionEvent::learner_message("never-opened", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownSession(_)));

    let err = engine
        .finalize(&"never-opened".into(), &ExerciseMetrics::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownSession(_)));
}
