//! Review workflow state machine. Every transition funnels through the
//! store's guarded transition primitive, so two racing writers resolve to
//! exactly one winner and the fields that travel with a transition
//! (assignee, decision history, priority score) commit in the same critical
//! section as the status. Everything after a won swap (workload counters,
//! audit events, notifications, tracker hand-off) is post-commit work.

use crate::assignment::AssignmentProposal;
use crate::config::{QueueConfig, RevisionConfig};
use crate::domain::{
    AssignmentEvent, Decision, OpaqueToken, Outcome, ReviewStatus, Submission, SubmissionId,
};
use crate::error::ReviewError;
use crate::external::{Notifier, Publisher};
use crate::storage::{Mutation, ReviewStore, StoreError};
use crate::tracker::PerformanceTracker;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub struct ReviewStateMachine {
    store: Arc<dyn ReviewStore>,
    notifier: Arc<dyn Notifier>,
    publisher: Arc<dyn Publisher>,
    tracker: Arc<PerformanceTracker>,
    queue_config: QueueConfig,
    revision_config: RevisionConfig,
}

impl ReviewStateMachine {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        notifier: Arc<dyn Notifier>,
        publisher: Arc<dyn Publisher>,
        tracker: Arc<PerformanceTracker>,
        queue_config: QueueConfig,
        revision_config: RevisionConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            publisher,
            tracker,
            queue_config,
            revision_config,
        }
    }

    /// Priority at enqueue time: class base, plus a boost per hour waited,
    /// plus backlog pressure from same-category queued submissions.
    async fn priority_score(&self, submission: &Submission) -> Result<f64, ReviewError> {
        let queued = self
            .store
            .submissions_with_status(ReviewStatus::Queued)
            .await?;
        let backlog = queued
            .iter()
            .filter(|s| s.category == submission.category)
            .count() as f64
            * self.queue_config.backlog_factor;
        Ok(submission.priority_class.base_score()
            + submission.age_hours(Utc::now()) * self.queue_config.age_boost_per_hour
            + backlog.min(self.queue_config.backlog_ceiling))
    }

    /// Move a freshly submitted or resubmitted item into the queue.
    #[instrument(skip(self), fields(submission.id = %id))]
    pub async fn enqueue(&self, id: SubmissionId) -> Result<Submission, ReviewError> {
        let current = self.store.get_submission(id).await?;
        let expected = match current.status {
            ReviewStatus::Submitted | ReviewStatus::Resubmitted => current.status,
            other => {
                return Err(ReviewError::InvalidTransition {
                    from: other,
                    operation: "enqueue",
                })
            }
        };

        let score = self.priority_score(&current).await?;
        let submission = self
            .transition(
                id,
                expected,
                ReviewStatus::Queued,
                "enqueue",
                Box::new(move |s| {
                    s.priority_score = score;
                    s.assigned_reviewer = None;
                }),
            )
            .await?;
        info!(
            priority_score = submission.priority_score,
            category = %submission.category,
            "Submission queued"
        );
        Ok(submission)
    }

    /// Commit an assignment proposal. Revalidates the reviewer against
    /// current storage, then races the status swap; the loser of a
    /// concurrent double-assign gets `AlreadyAssigned`.
    #[instrument(skip(self, proposal), fields(submission.id = %id, reviewer.token = %proposal.reviewer.token))]
    pub async fn assign(
        &self,
        id: SubmissionId,
        proposal: &AssignmentProposal,
    ) -> Result<Submission, ReviewError> {
        let token = &proposal.reviewer.token;

        // Snapshot data may be stale; recheck against the live profile.
        let profile = self.store.get_profile(token).await?;
        if !profile.available || !profile.has_capacity() {
            return Err(ReviewError::ReviewerUnavailable);
        }

        let current = self.store.get_submission(id).await?;
        let expected = match current.status {
            ReviewStatus::Queued | ReviewStatus::Escalated => current.status,
            ReviewStatus::Assigned | ReviewStatus::InReview => {
                return Err(ReviewError::AlreadyAssigned)
            }
            other => {
                return Err(ReviewError::InvalidTransition {
                    from: other,
                    operation: "assign",
                })
            }
        };

        let assignee = token.clone();
        let submission = self
            .transition(
                id,
                expected,
                ReviewStatus::Assigned,
                "assign",
                Box::new(move |s| s.assigned_reviewer = Some(assignee)),
            )
            .await?;

        let now = Utc::now();
        if let Err(e) = self.store.mark_assigned(token, now).await {
            // Profile vanished between revalidation and commit; put the
            // submission back so the next sweep can retry it.
            error!(error = %e, "Workload bump failed after status swap, requeueing");
            let _ = self
                .store
                .transition_submission(
                    id,
                    ReviewStatus::Assigned,
                    expected,
                    Box::new(|s| s.assigned_reviewer = None),
                )
                .await;
            return Err(e.into());
        }

        self.store
            .record_assignment(AssignmentEvent {
                submission_id: id,
                reviewer: token.clone(),
                assigned_at: now,
                score_at_assignment: proposal.score,
            })
            .await?;

        info!(score = proposal.score, "Submission assigned");
        self.notify_quiet(token, "You have been assigned a submission to review.")
            .await;
        Ok(submission)
    }

    /// Assignee acknowledges they are actively reviewing.
    #[instrument(skip(self), fields(submission.id = %id, reviewer.token = %reviewer))]
    pub async fn start_review(
        &self,
        id: SubmissionId,
        reviewer: &OpaqueToken,
    ) -> Result<Submission, ReviewError> {
        let current = self.store.get_submission(id).await?;
        if current.assigned_reviewer.as_ref() != Some(reviewer) {
            return Err(ReviewError::UnauthorizedReviewer);
        }
        self.transition(
            id,
            ReviewStatus::Assigned,
            ReviewStatus::InReview,
            "start_review",
            Box::new(|_: &mut Submission| {}),
        )
        .await
    }

    /// Record the assignee's verdict and run the post-commit fan-out:
    /// workload release, publication (approve only, at most once),
    /// contributor notification, and the tracker hand-off.
    #[instrument(skip(self, feedback), fields(submission.id = %id, reviewer.token = %reviewer))]
    pub async fn record_decision(
        &self,
        id: SubmissionId,
        reviewer: &OpaqueToken,
        outcome: Outcome,
        feedback: &str,
    ) -> Result<Submission, ReviewError> {
        let current = self.store.get_submission(id).await?;
        if !matches!(
            current.status,
            ReviewStatus::Assigned | ReviewStatus::InReview
        ) {
            return Err(ReviewError::InvalidTransition {
                from: current.status,
                operation: "record_decision",
            });
        }
        if current.assigned_reviewer.as_ref() != Some(reviewer) {
            return Err(ReviewError::UnauthorizedReviewer);
        }
        if !self.assignee_profile_exists(reviewer).await? {
            return Err(self
                .invariant_breach(id, "assigned reviewer token has no stored profile")
                .await);
        }
        if outcome.requires_feedback() && feedback.trim().is_empty() {
            return Err(ReviewError::FeedbackRequired);
        }

        let next = match outcome {
            Outcome::Approve => ReviewStatus::Approved,
            Outcome::Reject => ReviewStatus::Rejected,
            Outcome::Revise => ReviewStatus::RevisionRequested,
        };
        let decision = Decision {
            submission_id: id,
            reviewer: reviewer.clone(),
            outcome,
            feedback: feedback.to_string(),
            decided_at: Utc::now(),
        };
        let submission = self
            .transition(
                id,
                current.status,
                next,
                "record_decision",
                Box::new(move |s| s.decision_history.push(decision)),
            )
            .await?;
        self.store.release_workload(reviewer).await?;

        info!(outcome = ?outcome, status = %submission.status, "Decision recorded");
        self.finish_decision(&submission).await;
        Ok(submission)
    }

    /// Contributor resubmits after a revision request. Exceeding the
    /// revision cap escalates to the senior-only queue instead of cycling.
    #[instrument(skip(self), fields(submission.id = %id))]
    pub async fn resubmit(
        &self,
        id: SubmissionId,
        contributor: &OpaqueToken,
    ) -> Result<Submission, ReviewError> {
        let current = self.store.get_submission(id).await?;
        if current.contributor != *contributor {
            return Err(ReviewError::PermissionDenied);
        }
        if current.status != ReviewStatus::RevisionRequested {
            return Err(ReviewError::InvalidTransition {
                from: current.status,
                operation: "resubmit",
            });
        }

        if current.revision_count >= self.revision_config.max_revisions {
            self.transition(
                id,
                ReviewStatus::RevisionRequested,
                ReviewStatus::Escalated,
                "resubmit",
                Box::new(|s| {
                    s.senior_only = true;
                    s.assigned_reviewer = None;
                }),
            )
            .await?;
            warn!(
                revision_count = current.revision_count,
                "Revision cap reached, escalated to senior queue"
            );
            self.alert_quiet(&format!(
                "Submission {} exceeded the revision limit and was escalated.",
                id
            ))
            .await;
            return Err(ReviewError::RevisionLimitExceeded);
        }

        self.transition(
            id,
            ReviewStatus::RevisionRequested,
            ReviewStatus::Resubmitted,
            "resubmit",
            Box::new(|s| {
                s.revision_count += 1;
                s.assigned_reviewer = None;
            }),
        )
        .await?;
        self.enqueue(id).await
    }

    /// SLA path: pull a stalled assignment back into the queue. The
    /// previous reviewer's workload slot is released. A stalled submission
    /// whose assignee has no stored profile is corrupt state, not a
    /// recovery candidate; it is quarantined instead.
    #[instrument(skip(self), fields(submission.id = %id))]
    pub async fn force_requeue(&self, id: SubmissionId) -> Result<Submission, ReviewError> {
        let current = self.store.get_submission(id).await?;
        let expected = match current.status {
            ReviewStatus::Assigned | ReviewStatus::InReview => current.status,
            other => {
                return Err(ReviewError::InvalidTransition {
                    from: other,
                    operation: "force_requeue",
                })
            }
        };

        let previous = match current.assigned_reviewer.clone() {
            Some(token) => token,
            None => {
                return Err(self
                    .invariant_breach(id, "held submission has no assignee recorded")
                    .await)
            }
        };
        // Verify the assignee before touching the status so the workload
        // release cannot fail after a half-done recovery.
        if !self.assignee_profile_exists(&previous).await? {
            return Err(self
                .invariant_breach(id, "assigned reviewer token has no stored profile")
                .await);
        }

        let score = self.priority_score(&current).await?;
        let submission = match self
            .store
            .transition_submission(
                id,
                expected,
                ReviewStatus::Queued,
                Box::new(move |s| {
                    s.assigned_reviewer = None;
                    s.priority_score = score;
                }),
            )
            .await
        {
            Ok(s) => s,
            Err(StoreError::StatusConflict { .. }) => return Err(ReviewError::StaleSweepSkip),
            Err(e) => return Err(e.into()),
        };

        self.store.release_workload(&previous).await?;
        self.notify_quiet(
            &previous,
            "A stalled submission was reassigned away from you.",
        )
        .await;
        warn!("Stalled assignment force-requeued");
        Ok(submission)
    }

    /// Park a submission for manual attention. Reached when an invariant
    /// check fails; always raises an operator alert.
    #[instrument(skip(self, reason), fields(submission.id = %id))]
    pub async fn quarantine(
        &self,
        id: SubmissionId,
        reason: &str,
    ) -> Result<Submission, ReviewError> {
        let current = self.store.get_submission(id).await?;
        if current.status.is_terminal() || current.status == ReviewStatus::Quarantined {
            return Err(ReviewError::InvalidTransition {
                from: current.status,
                operation: "quarantine",
            });
        }
        let submission = self
            .transition(
                id,
                current.status,
                ReviewStatus::Quarantined,
                "quarantine",
                Box::new(|_: &mut Submission| {}),
            )
            .await?;
        error!(reason = reason, "Submission quarantined");
        self.alert_quiet(&format!("Submission {} quarantined: {}", id, reason))
            .await;
        Ok(submission)
    }

    /// Operator path to a terminal state, bypassing the assignee check.
    /// The trust gate lives with the caller; only transition legality is
    /// enforced here. Revise is not a valid override outcome.
    #[instrument(skip(self, feedback), fields(submission.id = %id, operator.token = %operator))]
    pub async fn override_decision(
        &self,
        id: SubmissionId,
        operator: &OpaqueToken,
        outcome: Outcome,
        feedback: &str,
    ) -> Result<Submission, ReviewError> {
        let next = match outcome {
            Outcome::Approve => ReviewStatus::Approved,
            Outcome::Reject => ReviewStatus::Rejected,
            Outcome::Revise => {
                let current = self.store.get_submission(id).await?;
                return Err(ReviewError::InvalidTransition {
                    from: current.status,
                    operation: "override_decision",
                });
            }
        };
        if outcome.requires_feedback() && feedback.trim().is_empty() {
            return Err(ReviewError::FeedbackRequired);
        }

        let current = self.store.get_submission(id).await?;
        if !matches!(
            current.status,
            ReviewStatus::Queued
                | ReviewStatus::Assigned
                | ReviewStatus::InReview
                | ReviewStatus::RevisionRequested
                | ReviewStatus::Escalated
        ) {
            return Err(ReviewError::InvalidTransition {
                from: current.status,
                operation: "override_decision",
            });
        }
        if let Some(previous) = &current.assigned_reviewer {
            if !self.assignee_profile_exists(previous).await? {
                return Err(self
                    .invariant_breach(id, "assigned reviewer token has no stored profile")
                    .await);
            }
        }

        let decision = Decision {
            submission_id: id,
            reviewer: operator.clone(),
            outcome,
            feedback: feedback.to_string(),
            decided_at: Utc::now(),
        };
        let submission = self
            .transition(
                id,
                current.status,
                next,
                "override_decision",
                Box::new(move |s| {
                    s.assigned_reviewer = None;
                    s.decision_history.push(decision);
                }),
            )
            .await?;

        // The status swap guarantees the assignee read above is the one
        // that just lost its submission.
        if let Some(previous) = current.assigned_reviewer {
            self.store.release_workload(&previous).await?;
            self.notify_quiet(&previous, "A submission you held was resolved by an operator.")
                .await;
        }

        warn!(outcome = ?outcome, "Decision overridden by operator");
        self.finish_decision(&submission).await;
        Ok(submission)
    }

    /// Post-commit fan-out shared by the assignee and operator decision
    /// paths. None of this can fail the already-committed transition.
    async fn finish_decision(&self, submission: &Submission) {
        if submission.status == ReviewStatus::Approved {
            match self.store.mark_published(submission.id).await {
                Ok(true) => {
                    if let Err(e) = self.publisher.publish(&submission.id.to_string()).await {
                        error!(error = %e, "Publication failed; marker retained for manual retry");
                        self.alert_quiet(&format!(
                            "Publication failed for approved submission {}.",
                            submission.id
                        ))
                        .await;
                    }
                }
                Ok(false) => {
                    info!("Submission already published, skipping");
                }
                Err(e) => error!(error = %e, "Publication marker check failed"),
            }
        }

        let message = match submission.status {
            ReviewStatus::Approved => "Your submission was approved and published.",
            ReviewStatus::Rejected => "Your submission was not accepted. Feedback is attached.",
            _ => "Your submission needs revision. Feedback is attached.",
        };
        self.notify_quiet(&submission.contributor, message).await;

        let tracker = Arc::clone(&self.tracker);
        let id = submission.id;
        tokio::spawn(async move {
            if let Err(e) = tracker.process(id).await {
                error!(submission.id = %id, error = %e, "Tracker processing failed");
            }
        });
    }

    async fn assignee_profile_exists(&self, token: &OpaqueToken) -> Result<bool, ReviewError> {
        match self.store.get_profile(token).await {
            Ok(_) => Ok(true),
            Err(StoreError::ProfileNotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// A submission referencing state the directory has no record of is
    /// corrupt. Quarantine it, alert, and hand the violation back to the
    /// caller.
    async fn invariant_breach(&self, id: SubmissionId, reason: &str) -> ReviewError {
        error!(reason = reason, "Invariant violation detected");
        if let Err(e) = self.quarantine(id, reason).await {
            error!(error = %e, "Quarantine after invariant violation failed");
            self.alert_quiet(&format!(
                "Submission {} needs manual attention: {}",
                id, reason
            ))
            .await;
        }
        ReviewError::InvariantViolation(reason.to_string())
    }

    async fn transition(
        &self,
        id: SubmissionId,
        expected: ReviewStatus,
        next: ReviewStatus,
        operation: &'static str,
        apply: Mutation,
    ) -> Result<Submission, ReviewError> {
        match self
            .store
            .transition_submission(id, expected, next, apply)
            .await
        {
            Ok(submission) => Ok(submission),
            Err(StoreError::StatusConflict { actual, .. }) => {
                if matches!(actual, ReviewStatus::Assigned | ReviewStatus::InReview)
                    && operation == "assign"
                {
                    Err(ReviewError::AlreadyAssigned)
                } else {
                    Err(ReviewError::InvalidTransition {
                        from: actual,
                        operation,
                    })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn notify_quiet(&self, recipient: &OpaqueToken, message: &str) {
        if let Err(e) = self.notifier.notify(recipient, message).await {
            warn!(recipient.token = %recipient, error = %e, "Notification delivery failed");
        }
    }

    async fn alert_quiet(&self, message: &str) {
        if let Err(e) = self.notifier.alert(message).await {
            error!(error = %e, "Operator alert delivery failed");
        }
    }
}
