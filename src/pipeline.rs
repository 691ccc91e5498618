//! Wired-up surface of the crate: one struct owning every component, with
//! the operations callers actually invoke. Construction is plain dependency
//! injection; the externals (identity, notifications, publication) come in
//! as trait objects.

use crate::assignment::AssignmentEngine;
use crate::config::ReviewPipelineConfig;
use crate::coordinator::{BatchCoordinator, OverrideReport, SweepReport};
use crate::directory::ReviewerDirectory;
use crate::domain::{
    OpaqueToken, Outcome, PriorityClass, ReviewStatus, Submission, SubmissionId,
};
use crate::error::ReviewError;
use crate::external::{IdentityResolver, Notifier, Publisher};
use crate::review::ReviewStateMachine;
use crate::storage::ReviewStore;
use crate::tracker::{PerformanceTracker, ReviewerStats};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument};

/// Contributor-facing view of one submission. Reviewer tokens stay
/// internal; only presence of an assignee is exposed.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionStatus {
    pub id: SubmissionId,
    pub status: ReviewStatus,
    /// Position in the queue by current priority order, when queued.
    pub queue_position: Option<usize>,
    pub assignee_present: bool,
    pub revision_count: u32,
    pub latest_feedback: Option<String>,
}

pub struct ReviewPipeline {
    store: Arc<dyn ReviewStore>,
    directory: Arc<ReviewerDirectory>,
    state_machine: Arc<ReviewStateMachine>,
    tracker: Arc<PerformanceTracker>,
    coordinator: Arc<BatchCoordinator>,
}

impl ReviewPipeline {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        resolver: Arc<dyn IdentityResolver>,
        notifier: Arc<dyn Notifier>,
        publisher: Arc<dyn Publisher>,
        config: ReviewPipelineConfig,
    ) -> Self {
        let directory = Arc::new(ReviewerDirectory::new(
            resolver,
            Arc::clone(&store),
            &config.directory,
            config.assignment.default_workload_cap,
        ));
        let tracker = Arc::new(PerformanceTracker::new(
            Arc::clone(&store),
            config.tracker.clone(),
        ));
        let state_machine = Arc::new(ReviewStateMachine::new(
            Arc::clone(&store),
            notifier,
            publisher,
            Arc::clone(&tracker),
            config.queue.clone(),
            config.revision.clone(),
        ));
        let coordinator = Arc::new(BatchCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&directory),
            AssignmentEngine::new(config.assignment.clone()),
            Arc::clone(&state_machine),
            Arc::clone(&tracker),
            config.sweep.clone(),
            config.operator_override.clone(),
        ));
        Self {
            store,
            directory,
            state_machine,
            tracker,
            coordinator,
        }
    }

    // --- contributor operations ---

    /// Accept new content into the pipeline. Returns the submission id the
    /// contributor uses to track progress.
    #[instrument(skip(self), fields(contributor.token = %contributor))]
    pub async fn submit(
        &self,
        contributor: OpaqueToken,
        category: impl Into<String> + std::fmt::Debug,
        priority_class: PriorityClass,
        complexity_hint: f64,
    ) -> Result<SubmissionId, ReviewError> {
        let submission = Submission::new(contributor, category, priority_class, complexity_hint);
        let id = submission.id;
        self.store.insert_submission(submission).await?;
        self.state_machine.enqueue(id).await?;
        info!(submission.id = %id, "Submission accepted");
        Ok(id)
    }

    pub async fn get_status(&self, id: SubmissionId) -> Result<SubmissionStatus, ReviewError> {
        let submission = self.store.get_submission(id).await?;
        let queue_position = if submission.status == ReviewStatus::Queued {
            let mut queued = self
                .store
                .submissions_with_status(ReviewStatus::Queued)
                .await?;
            queued.sort_by(|a, b| {
                b.priority_class
                    .cmp(&a.priority_class)
                    .then_with(|| b.priority_score.total_cmp(&a.priority_score))
                    .then_with(|| a.created_at.cmp(&b.created_at))
            });
            queued.iter().position(|s| s.id == id).map(|p| p + 1)
        } else {
            None
        };
        Ok(SubmissionStatus {
            id,
            status: submission.status,
            queue_position,
            assignee_present: submission.assigned_reviewer.is_some(),
            revision_count: submission.revision_count,
            latest_feedback: submission
                .decision_history
                .last()
                .map(|d| d.feedback.clone()),
        })
    }

    pub async fn resubmit(
        &self,
        id: SubmissionId,
        contributor: &OpaqueToken,
    ) -> Result<SubmissionStatus, ReviewError> {
        self.state_machine.resubmit(id, contributor).await?;
        self.get_status(id).await
    }

    /// Every submission belonging to one contributor, newest first.
    pub async fn contributor_dashboard(
        &self,
        contributor: &OpaqueToken,
    ) -> Result<Vec<SubmissionStatus>, ReviewError> {
        let mut submissions = self.store.submissions_by_contributor(contributor).await?;
        submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut statuses = Vec::with_capacity(submissions.len());
        for submission in submissions {
            statuses.push(self.get_status(submission.id).await?);
        }
        Ok(statuses)
    }

    // --- reviewer operations ---

    pub async fn start_review(
        &self,
        id: SubmissionId,
        reviewer: &OpaqueToken,
    ) -> Result<(), ReviewError> {
        self.state_machine.start_review(id, reviewer).await?;
        Ok(())
    }

    pub async fn decide(
        &self,
        id: SubmissionId,
        reviewer: &OpaqueToken,
        outcome: Outcome,
        feedback: &str,
    ) -> Result<SubmissionStatus, ReviewError> {
        self.state_machine
            .record_decision(id, reviewer, outcome, feedback)
            .await?;
        self.get_status(id).await
    }

    /// Rolling metrics and recognition tier for one reviewer.
    pub async fn reviewer_dashboard(
        &self,
        reviewer: &OpaqueToken,
    ) -> Result<ReviewerStats, ReviewError> {
        self.tracker.stats(reviewer).await
    }

    // --- operator operations ---

    pub async fn grant_reviewer(&self, token: &OpaqueToken) -> Result<(), ReviewError> {
        self.directory.grant_reviewer(token).await
    }

    pub async fn revoke_reviewer(&self, token: &OpaqueToken) -> Result<(), ReviewError> {
        self.directory.revoke(token).await
    }

    pub async fn admin_override(
        &self,
        operator: &OpaqueToken,
        ids: &[SubmissionId],
        outcome: Outcome,
        feedback: &str,
    ) -> Result<OverrideReport, ReviewError> {
        self.coordinator
            .bulk_override(operator, ids, outcome, feedback)
            .await
    }

    // --- coordination ---

    pub async fn run_sweep(&self) -> Result<SweepReport, ReviewError> {
        self.coordinator.run_sweep().await
    }

    /// Start the background sweep loop. Dropping or signaling the returned
    /// sender stops it.
    pub fn spawn_periodic_sweeps(&self) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = watch::channel(false);
        let coordinator = Arc::clone(&self.coordinator);
        let handle = tokio::spawn(coordinator.run_periodic(rx));
        (tx, handle)
    }
}
