//! Replay a recorded interaction log through the risk engine
//!
//! Input is JSON Lines, one [`ReplayEntry`] per line. Every assessment the
//! engine produces is written to stdout as a JSON line, followed by the
//! analytics of each course seen.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};
use tutorlens_core::{
    AssessmentRecord, CourseAnalytics, CourseId, ExerciseMetrics, InMemoryAssessmentLog,
    InteractionEvent, RiskEngine, SessionId, SessionInfo,
};

use crate::config::ConfigLoader;

/// Replay arguments
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON Lines file of replay entries
    pub file: PathBuf,

    /// Only report analytics for this course
    #[arg(long)]
    pub course: Option<String>,

    /// Extra config file applied after user and project config
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// One line of a replay file, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEntry {
    Open(SessionInfo),
    Event(InteractionEvent),
    Finalize {
        session_id: SessionId,
        #[serde(default)]
        metrics: ExerciseMetrics,
    },
    Audit {
        session_id: SessionId,
        #[serde(default)]
        metrics: ExerciseMetrics,
    },
    Close {
        session_id: SessionId,
    },
}

/// One line of replay output.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayOutput<'a> {
    Assessment(&'a AssessmentRecord),
    Course(&'a CourseAnalytics),
}

/// Counters reported once the replay ends.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub entries: usize,
    pub events: usize,
    pub assessments: usize,
    pub courses: usize,
}

/// Run replay command
pub async fn run(args: ReplayArgs) -> Result<()> {
    let config = ConfigLoader::load(args.config.as_deref())?;
    let log = Arc::new(InMemoryAssessmentLog::with_capacity(
        config.engine.broadcast_capacity,
    ));
    let engine = RiskEngine::new(config, log);

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let summary = replay(
        &engine,
        BufReader::new(file),
        &mut out,
        args.course.map(CourseId::from),
    )
    .await?;
    engine.shutdown().await;

    info!(
        entries = summary.entries,
        events = summary.events,
        assessments = summary.assessments,
        courses = summary.courses,
        "Replay complete"
    );
    Ok(())
}

/// Drive `engine` with every entry of `input`, writing JSON lines to `out`.
pub async fn replay<R: BufRead, W: Write>(
    engine: &RiskEngine,
    input: R,
    out: &mut W,
    course: Option<CourseId>,
) -> Result<ReplaySummary> {
    let mut rx = engine.subscribe();
    let mut summary = ReplaySummary::default();
    let mut seen_courses = BTreeSet::new();

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("Failed to read line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: ReplayEntry = serde_json::from_str(&line)
            .with_context(|| format!("Invalid replay entry on line {line_no}"))?;
        summary.entries += 1;

        apply(engine, entry, &mut summary, &mut seen_courses)
            .await
            .with_context(|| format!("Replay failed on line {line_no}"))?;
        summary.assessments += drain(&mut rx, out)?;
    }

    let courses: Vec<CourseId> = match course {
        Some(course) => vec![course],
        None => seen_courses.into_iter().collect(),
    };
    for course_id in &courses {
        let analytics = engine.aggregate_course(course_id).await?;
        write_line(out, &ReplayOutput::Course(&analytics))?;
    }
    summary.courses = courses.len();

    Ok(summary)
}

async fn apply(
    engine: &RiskEngine,
    entry: ReplayEntry,
    summary: &mut ReplaySummary,
    seen_courses: &mut BTreeSet<CourseId>,
) -> Result<()> {
    match entry {
        ReplayEntry::Open(info) => {
            seen_courses.insert(info.course_id.clone());
            engine.open_session(info).await?;
        }
        ReplayEntry::Event(event) => {
            summary.events += 1;
            engine.ingest(event).await?;
        }
        ReplayEntry::Finalize {
            session_id,
            metrics,
        } => {
            engine.finalize(&session_id, &metrics).await?;
        }
        ReplayEntry::Audit {
            session_id,
            metrics,
        } => {
            engine.audit(&session_id, &metrics).await?;
        }
        ReplayEntry::Close { session_id } => {
            let snapshot = engine.close_session(&session_id).await?;
            debug!(%session_id, phase = %snapshot.phase.current, "Closed session");
        }
    }
    Ok(())
}

/// Write every assessment published so far.
fn drain<W: Write>(
    rx: &mut broadcast::Receiver<AssessmentRecord>,
    out: &mut W,
) -> Result<usize> {
    let mut written = 0;
    loop {
        match rx.try_recv() {
            Ok(record) => {
                write_line(out, &ReplayOutput::Assessment(&record))?;
                written += 1;
            }
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Assessment output lagged; records dropped");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    Ok(written)
}

fn write_line<W: Write>(out: &mut W, output: &ReplayOutput<'_>) -> Result<()> {
    serde_json::to_writer(&mut *out, output)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorlens_core::EngineConfig;

    const SESSION: &str = r#"
{"type":"open","session_id":"s1","student_id":"ana","course_id":"cs101","started_at":"2025-03-01T10:00:00Z"}
{"type":"event","session_id":"s1","timestamp":"2025-03-01T10:01:00Z","origin":"learner","kind":"chat_message","text":"give me the code"}
{"type":"event","session_id":"s1","timestamp":"2025-03-01T10:02:00Z","origin":"tutor","kind":"chat_message","text":"Let's plan first","phase_hint":"planning"}
{"type":"event","session_id":"s1","timestamp":"2025-03-01T10:05:00Z","origin":"learner","kind":"code_submission","code":"print(1)","outcome":{"passed":false,"grade":3.0,"exercise_id":"ex-1"}}

{"type":"finalize","session_id":"s1","metrics":{"completion_rate":0.0,"average_attempts":1.0,"time_spent_minutes":5.0}}
"#;

    fn engine() -> RiskEngine {
        RiskEngine::new(
            EngineConfig::default(),
            Arc::new(InMemoryAssessmentLog::new()),
        )
    }

    fn output_lines(out: Vec<u8>) -> Vec<serde_json::Value> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_entry_parses_event_with_flat_body() {
        let line = r#"{"type":"event","session_id":"s","origin":"learner","kind":"chat_message","text":"hola"}"#;
        let entry: ReplayEntry = serde_json::from_str(line).unwrap();
        match entry {
            ReplayEntry::Event(event) => assert_eq!(event.text_or_code(), "hola"),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_replay_writes_assessments_then_course() {
        let engine = engine();
        let mut out = Vec::new();

        let summary = replay(&engine, SESSION.as_bytes(), &mut out, None)
            .await
            .unwrap();

        assert_eq!(summary.entries, 5);
        assert_eq!(summary.events, 3);
        assert_eq!(summary.assessments, 2);
        assert_eq!(summary.courses, 1);

        let lines = output_lines(out);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "assessment");
        assert_eq!(lines[0]["trigger"], "submission");
        assert_eq!(lines[1]["trigger"], "session_end");
        assert_eq!(lines[1]["assessment"]["code_requests"], 1);
        assert_eq!(lines[2]["type"], "course");
        assert_eq!(lines[2]["course_id"], "cs101");
        assert_eq!(lines[2]["total_students"], 1);
    }

    #[tokio::test]
    async fn test_replay_demo_file() {
        let engine = engine();
        let mut out = Vec::new();
        let input = include_str!("../../../demos/replay.jsonl");

        let summary = replay(&engine, input.as_bytes(), &mut out, None)
            .await
            .unwrap();

        assert_eq!(summary.courses, 1);
        let lines = output_lines(out);
        let course = lines.last().unwrap();
        assert_eq!(course["total_students"], 3);
        assert_eq!(course["students_at_risk"], 1);
        assert_eq!(course["students"][0]["student_id"], "ana");
        assert_eq!(course["students"][0]["dimension"], "ai_dependency");
        assert_eq!(engine.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_replay_course_filter() {
        let engine = engine();
        let mut out = Vec::new();

        let summary = replay(
            &engine,
            SESSION.as_bytes(),
            &mut out,
            Some(CourseId::from("math")),
        )
        .await
        .unwrap();

        assert_eq!(summary.courses, 1);
        let lines = output_lines(out);
        let course = lines.last().unwrap();
        assert_eq!(course["course_id"], "math");
        assert_eq!(course["total_students"], 0);
    }

    #[tokio::test]
    async fn test_replay_reports_line_of_bad_entry() {
        let engine = engine();
        let mut out = Vec::new();
        let input = "{\"type\":\"open\",\"session_id\":\"s\",\"student_id\":\"a\",\"course_id\":\"c\"}\n{\"type\":\"bogus\"}\n";

        let err = replay(&engine, input.as_bytes(), &mut out, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_replay_rejects_event_for_unopened_session() {
        let engine = engine();
        let mut out = Vec::new();
        let input = r#"{"type":"event","session_id":"ghost","origin":"learner","kind":"chat_message","text":"hi"}"#;

        let err = replay(&engine, input.as_bytes(), &mut out, None)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Unknown session"));
    }
}
