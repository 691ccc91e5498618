use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

pub type SubmissionId = Uuid;

/// Unlinkable identifier issued by the external identity subsystem.
///
/// Treated strictly as a hash-equatable, non-enumerable key: this crate never
/// resolves, derives, or stores anything that could correlate a token back to
/// a real identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueToken(String);

impl OpaqueToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpaqueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OpaqueToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Priority classes for queued submissions.
/// Higher values dequeue first within a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    Low = 1,
    Normal = 2,
    Urgent = 3,
}

impl PriorityClass {
    /// Base score contribution used by the enqueue priority heuristic.
    pub fn base_score(self) -> f64 {
        self as u8 as f64
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriorityClass::Urgent => "URGENT",
            PriorityClass::Normal => "NORMAL",
            PriorityClass::Low => "LOW",
        };
        write!(f, "{}", label)
    }
}

/// Closed review status set. Transitions outside the table in
/// `review::state_machine` are unrepresentable at commit time because every
/// status write goes through the storage compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Submitted,
    Queued,
    Assigned,
    InReview,
    Approved,
    Rejected,
    RevisionRequested,
    Resubmitted,
    /// Senior-only queue: revision cap exhausted, operator action required.
    Escalated,
    /// Manual-intervention state reached only through invariant violations.
    Quarantined,
}

impl ReviewStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReviewStatus::Approved | ReviewStatus::Rejected)
    }

    /// States in which `assigned_reviewer` must be empty.
    pub fn forbids_assignee(self) -> bool {
        matches!(
            self,
            ReviewStatus::Submitted
                | ReviewStatus::Queued
                | ReviewStatus::Resubmitted
                | ReviewStatus::Escalated
        )
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReviewStatus::Submitted => "submitted",
            ReviewStatus::Queued => "queued",
            ReviewStatus::Assigned => "assigned",
            ReviewStatus::InReview => "in_review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::RevisionRequested => "revision_requested",
            ReviewStatus::Resubmitted => "resubmitted",
            ReviewStatus::Escalated => "escalated",
            ReviewStatus::Quarantined => "quarantined",
        };
        write!(f, "{}", label)
    }
}

/// Reviewer verdict on a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Approve,
    Reject,
    Revise,
}

impl Outcome {
    pub fn requires_feedback(self) -> bool {
        matches!(self, Outcome::Reject | Outcome::Revise)
    }
}

/// Immutable decision record, appended to `Submission::decision_history`
/// in commit order and never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub submission_id: SubmissionId,
    pub reviewer: OpaqueToken,
    pub outcome: Outcome,
    pub feedback: String,
    pub decided_at: DateTime<Utc>,
}

/// Audit record emitted on every successful assignment commit; also the
/// speed-metric input (decided_at − assigned_at).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentEvent {
    pub submission_id: SubmissionId,
    pub reviewer: OpaqueToken,
    pub assigned_at: DateTime<Utc>,
    pub score_at_assignment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub contributor: OpaqueToken,
    pub category: String,
    pub priority_class: PriorityClass,
    pub complexity_hint: f64,
    pub status: ReviewStatus,
    pub assigned_reviewer: Option<OpaqueToken>,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
    pub revision_count: u32,
    /// Computed at enqueue time: class base + age boost + category backlog.
    pub priority_score: f64,
    /// Set once the revision cap is exhausted; restricts assignment to
    /// senior-capable reviewers.
    pub senior_only: bool,
    pub decision_history: Vec<Decision>,
}

impl Submission {
    pub fn new(
        contributor: OpaqueToken,
        category: impl Into<String>,
        priority_class: PriorityClass,
        complexity_hint: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            contributor,
            category: category.into(),
            priority_class,
            complexity_hint,
            status: ReviewStatus::Submitted,
            assigned_reviewer: None,
            created_at: now,
            status_changed_at: now,
            revision_count: 0,
            priority_score: 0.0,
            senior_only: false,
            decision_history: Vec::new(),
        }
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds().max(0) as f64 / 3600.0
    }
}

/// Rolling per-reviewer metrics maintained by the performance tracker.
/// All terms live in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RollingMetrics {
    pub speed: f64,
    pub approval_rate: f64,
    pub volume: f64,
    pub consistency: f64,
}

impl Default for RollingMetrics {
    fn default() -> Self {
        // Neutral starting point for reviewers with no decision history.
        Self {
            speed: 0.5,
            approval_rate: 0.5,
            volume: 0.0,
            consistency: 1.0,
        }
    }
}

/// One resolved decision, kept in the profile's trailing window for
/// approval-rate, volume, and consistency computation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecisionSample {
    pub decided_at: DateTime<Utc>,
    pub response_secs: f64,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerProfile {
    pub token: OpaqueToken,
    pub workload_current: u32,
    pub workload_cap: u32,
    pub performance_score: f64,
    pub available: bool,
    pub last_assigned_at: Option<DateTime<Utc>>,
    pub rolling: RollingMetrics,
    pub samples: Vec<DecisionSample>,
}

impl ReviewerProfile {
    pub fn new(token: OpaqueToken, workload_cap: u32) -> Self {
        Self {
            token,
            workload_current: 0,
            workload_cap,
            performance_score: 0.5,
            available: true,
            last_assigned_at: None,
            rolling: RollingMetrics::default(),
            samples: Vec::new(),
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.workload_current < self.workload_cap
    }
}

/// Observational recognition tier: a pure function of performance score and
/// decision volume, never fed back into assignment scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionTier {
    Newcomer,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

/// Eligibility view handed to the assignment engine: stored workload and
/// metrics merged with directory-resolved capabilities.
#[derive(Debug, Clone)]
pub struct ReviewerView {
    pub token: OpaqueToken,
    pub category_preferences: BTreeSet<String>,
    pub senior: bool,
    pub available: bool,
    pub workload_current: u32,
    pub workload_cap: u32,
    pub performance_score: f64,
    pub speed: f64,
    pub last_assigned_at: Option<DateTime<Utc>>,
}

impl ReviewerView {
    pub fn has_capacity(&self) -> bool {
        self.workload_current < self.workload_cap
    }
}
