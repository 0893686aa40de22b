//! Course and student rollups over logged assessments.
//!
//! Both views are recomputed from the records on every call and never touch
//! live session state. Only the latest record per student (course view) or per
//! session (student view) counts; older records are superseded.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::log::AssessmentRecord;
use crate::scoring::{RiskDimension, RiskLevel};
use crate::types::{CourseId, SessionId, StudentId};

/// Score change between two sessions that still counts as stable.
pub const TREND_TOLERANCE: i16 = 5;

/// Latest standing of one student within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRiskSummary {
    pub student_id: StudentId,
    pub session_id: SessionId,
    pub score: u8,
    pub level: RiskLevel,
    pub dimension: RiskDimension,
    pub completion_rate: f64,
    pub assessed_at: DateTime<Utc>,
}

impl From<&AssessmentRecord> for StudentRiskSummary {
    fn from(record: &AssessmentRecord) -> Self {
        Self {
            student_id: record.student_id.clone(),
            session_id: record.session_id.clone(),
            score: record.assessment.score,
            level: record.assessment.level,
            dimension: record.assessment.dimension,
            completion_rate: record.completion_rate,
            assessed_at: record.created_at,
        }
    }
}

/// Risk rollup for one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseAnalytics {
    pub course_id: CourseId,
    pub total_students: usize,
    /// Mean latest score, 0.0 to 100.0.
    pub average_risk: f64,
    /// Students whose latest level is `high`.
    pub students_at_risk: usize,
    /// Mean latest completion rate.
    pub completion_rate: f64,
    /// Sorted by score descending, then student id.
    pub students: Vec<StudentRiskSummary>,
}

impl CourseAnalytics {
    /// The rollup of a course with no assessed students.
    pub fn empty(course_id: CourseId) -> Self {
        Self {
            course_id,
            total_students: 0,
            average_risk: 0.0,
            students_at_risk: 0,
            completion_rate: 0.0,
            students: Vec::new(),
        }
    }
}

/// Progress through the exercises of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    /// Derive the status from a completion rate.
    pub fn from_completion(rate: f64) -> Self {
        if rate.is_nan() || rate <= 0.0 {
            Self::NotStarted
        } else if rate >= 1.0 {
            Self::Completed
        } else {
            Self::InProgress
        }
    }
}

/// Direction of a student's risk between their two latest sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTrend {
    Improving,
    Stable,
    Worsening,
    Unknown,
}

impl RiskTrend {
    fn between(previous: u8, latest: u8) -> Self {
        let delta = i16::from(latest) - i16::from(previous);
        if delta < -TREND_TOLERANCE {
            Self::Improving
        } else if delta > TREND_TOLERANCE {
            Self::Worsening
        } else {
            Self::Stable
        }
    }
}

/// Risk rollup for one student across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRiskProfile {
    pub student_id: StudentId,
    /// Sessions with at least one assessment.
    pub sessions: usize,
    pub status: ProgressStatus,
    /// Completion rate of the latest session.
    pub completion_rate: f64,
    pub attempts_total: u32,
    pub attempts_passed: u32,
    /// Mean of the latest score of every session.
    pub average_score: f64,
    pub latest_score: Option<u8>,
    pub level: Option<RiskLevel>,
    pub dimension: Option<RiskDimension>,
    pub trend: RiskTrend,
    pub last_assessed_at: Option<DateTime<Utc>>,
}

impl StudentRiskProfile {
    pub fn empty(student_id: StudentId) -> Self {
        Self {
            student_id,
            sessions: 0,
            status: ProgressStatus::NotStarted,
            completion_rate: 0.0,
            attempts_total: 0,
            attempts_passed: 0,
            average_score: 0.0,
            latest_score: None,
            level: None,
            dimension: None,
            trend: RiskTrend::Unknown,
            last_assessed_at: None,
        }
    }
}

fn latest_by<'a, K, F>(
    records: impl Iterator<Item = &'a AssessmentRecord>,
    key: F,
) -> Vec<&'a AssessmentRecord>
where
    K: std::hash::Hash + Eq,
    F: Fn(&AssessmentRecord) -> K,
{
    let mut latest: HashMap<K, &AssessmentRecord> = HashMap::new();
    for record in records {
        latest
            .entry(key(record))
            .and_modify(|current| {
                if record.is_newer_than(*current) {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    latest.into_values().collect()
}

/// Summarize a course from its assessment records.
///
/// Records of other courses are ignored.
pub fn aggregate_course(course_id: &CourseId, records: &[AssessmentRecord]) -> CourseAnalytics {
    let latest = latest_by(
        records.iter().filter(|r| &r.course_id == course_id),
        |r| r.student_id.clone(),
    );
    if latest.is_empty() {
        return CourseAnalytics::empty(course_id.clone());
    }

    let mut students: Vec<StudentRiskSummary> =
        latest.par_iter().map(|r| StudentRiskSummary::from(*r)).collect();
    let (score_sum, completion_sum, at_risk) = students
        .par_iter()
        .map(|s| {
            (
                f64::from(s.score),
                s.completion_rate,
                usize::from(s.level == RiskLevel::High),
            )
        })
        .reduce(|| (0.0, 0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2));

    students.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });

    let total = students.len();
    CourseAnalytics {
        course_id: course_id.clone(),
        total_students: total,
        average_risk: (score_sum / total as f64).clamp(0.0, 100.0),
        students_at_risk: at_risk,
        completion_rate: completion_sum / total as f64,
        students,
    }
}

/// Summarize one student from their assessment records.
///
/// Records of other students are ignored.
pub fn aggregate_student(
    student_id: &StudentId,
    records: &[AssessmentRecord],
) -> StudentRiskProfile {
    let mut latest = latest_by(
        records.iter().filter(|r| &r.student_id == student_id),
        |r| r.session_id.clone(),
    );
    if latest.is_empty() {
        return StudentRiskProfile::empty(student_id.clone());
    }
    latest.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

    let sessions = latest.len();
    let score_sum: f64 = latest.iter().map(|r| f64::from(r.assessment.score)).sum();
    let attempts_total = latest
        .iter()
        .fold(0u32, |acc, r| acc.saturating_add(r.attempts_total));
    let attempts_passed = latest
        .iter()
        .fold(0u32, |acc, r| acc.saturating_add(r.attempts_passed));

    let newest = latest[sessions - 1];
    let trend = if sessions >= 2 {
        RiskTrend::between(latest[sessions - 2].assessment.score, newest.assessment.score)
    } else {
        RiskTrend::Unknown
    };

    StudentRiskProfile {
        student_id: student_id.clone(),
        sessions,
        status: ProgressStatus::from_completion(newest.completion_rate),
        completion_rate: newest.completion_rate,
        attempts_total,
        attempts_passed,
        average_score: score_sum / sessions as f64,
        latest_score: Some(newest.assessment.score),
        level: Some(newest.assessment.level),
        dimension: Some(newest.assessment.dimension),
        trend,
        last_assessed_at: Some(newest.created_at),
    }
}
