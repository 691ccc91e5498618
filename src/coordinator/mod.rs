//! Batch coordinator: the periodic sweep that drains the queue through the
//! assignment engine, recovers stalled assignments, and runs gated bulk
//! operator overrides. Per-item failures are skipped and logged so one bad
//! submission never stalls the sweep; invariant violations quarantine.

use crate::assignment::AssignmentEngine;
use crate::config::{OverrideConfig, SweepConfig};
use crate::directory::ReviewerDirectory;
use crate::domain::{OpaqueToken, Outcome, ReviewStatus, Submission, SubmissionId};
use crate::error::ReviewError;
use crate::review::ReviewStateMachine;
use crate::storage::ReviewStore;
use crate::tracker::PerformanceTracker;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// Outcome summary of one sweep pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub assigned: usize,
    pub unassigned: usize,
    pub requeued: usize,
    pub quarantined: usize,
    pub skipped: usize,
    /// Queued past the attention threshold; surfaced to operators.
    pub over_age: Vec<SubmissionId>,
}

/// Outcome summary of one bulk override.
#[derive(Debug, Default, Clone, Serialize)]
pub struct OverrideReport {
    pub succeeded: Vec<SubmissionId>,
    pub failed: Vec<(SubmissionId, String)>,
}

pub struct BatchCoordinator {
    store: Arc<dyn ReviewStore>,
    directory: Arc<ReviewerDirectory>,
    engine: AssignmentEngine,
    state_machine: Arc<ReviewStateMachine>,
    tracker: Arc<PerformanceTracker>,
    sweep_config: SweepConfig,
    override_config: OverrideConfig,
}

impl BatchCoordinator {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        directory: Arc<ReviewerDirectory>,
        engine: AssignmentEngine,
        state_machine: Arc<ReviewStateMachine>,
        tracker: Arc<PerformanceTracker>,
        sweep_config: SweepConfig,
        override_config: OverrideConfig,
    ) -> Self {
        Self {
            store,
            directory,
            engine,
            state_machine,
            tracker,
            sweep_config,
            override_config,
        }
    }

    /// One full sweep: recover stalled assignments, then drain the queue
    /// in priority order against a single directory snapshot.
    #[instrument(skip(self))]
    pub async fn run_sweep(&self) -> Result<SweepReport, ReviewError> {
        let mut report = SweepReport::default();
        let now = Utc::now();

        self.recover_stalled(&mut report, now).await?;

        let mut pending = self
            .store
            .submissions_with_status(ReviewStatus::Queued)
            .await?;
        pending.extend(
            self.store
                .submissions_with_status(ReviewStatus::Escalated)
                .await?,
        );
        // Highest class first, then computed score, then oldest.
        pending.sort_by(|a, b| {
            b.priority_class
                .cmp(&a.priority_class)
                .then_with(|| b.priority_score.total_cmp(&a.priority_score))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        report.scanned = pending.len();

        let attention_cutoff = now - Duration::hours(self.sweep_config.escalate_after_hours);
        let mut pool = self.directory.snapshot().await?;

        for submission in pending {
            if submission.status == ReviewStatus::Queued
                && submission.status_changed_at < attention_cutoff
            {
                report.over_age.push(submission.id);
            }
            match self.try_assign(&submission, &mut pool).await {
                Ok(true) => report.assigned += 1,
                Ok(false) => report.unassigned += 1,
                Err(e) if e.is_invariant_violation() => {
                    // The state machine already quarantined and alerted.
                    error!(submission.id = %submission.id, error = %e, "Invariant violation in sweep");
                    report.quarantined += 1;
                }
                Err(e) => {
                    warn!(submission.id = %submission.id, error = %e, "Sweep item skipped");
                    report.skipped += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            assigned = report.assigned,
            unassigned = report.unassigned,
            requeued = report.requeued,
            over_age = report.over_age.len(),
            "Sweep complete"
        );
        Ok(report)
    }

    /// Propose against the in-sweep pool and commit. One retry with a
    /// fresh proposal absorbs losing a race to an interactive assignment.
    async fn try_assign(
        &self,
        submission: &Submission,
        pool: &mut [crate::domain::ReviewerView],
    ) -> Result<bool, ReviewError> {
        for attempt in 0..2 {
            let proposal = match self.engine.propose(pool, submission) {
                Ok(p) => p,
                Err(ReviewError::NoEligibleReviewer) => return Ok(false),
                Err(e) => return Err(e),
            };
            match self.state_machine.assign(submission.id, &proposal).await {
                Ok(_) => {
                    // Keep the pool honest for the rest of this sweep.
                    if let Some(view) = pool.iter_mut().find(|v| v.token == proposal.reviewer.token)
                    {
                        view.workload_current += 1;
                        view.last_assigned_at = Some(Utc::now());
                    }
                    return Ok(true);
                }
                Err(ReviewError::AlreadyAssigned) | Err(ReviewError::StaleSweepSkip) => {
                    // Someone else took it; nothing left to do here.
                    return Ok(false);
                }
                Err(ReviewError::ReviewerUnavailable) if attempt == 0 => {
                    // Stale snapshot entry; drop the reviewer and retry.
                    if let Some(view) = pool.iter_mut().find(|v| v.token == proposal.reviewer.token)
                    {
                        view.available = false;
                    }
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    /// Force-requeue assignments that have sat past the staleness window.
    async fn recover_stalled(
        &self,
        report: &mut SweepReport,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), ReviewError> {
        let cutoff = now - Duration::hours(self.sweep_config.stale_after_hours);
        let mut held = self
            .store
            .submissions_with_status(ReviewStatus::Assigned)
            .await?;
        held.extend(
            self.store
                .submissions_with_status(ReviewStatus::InReview)
                .await?,
        );

        for submission in held {
            if submission.status_changed_at >= cutoff {
                continue;
            }
            match self.state_machine.force_requeue(submission.id).await {
                Ok(_) => report.requeued += 1,
                Err(ReviewError::StaleSweepSkip) => report.skipped += 1,
                Err(e) if e.is_invariant_violation() => {
                    // Quarantined by the state machine; do not retry it on
                    // later sweeps.
                    error!(submission.id = %submission.id, error = %e, "Stalled submission quarantined");
                    report.quarantined += 1;
                }
                Err(e) => {
                    warn!(submission.id = %submission.id, error = %e, "Stalled recovery skipped");
                    report.skipped += 1;
                }
            }
        }
        Ok(())
    }

    /// Resolve a batch of submissions to one terminal outcome. Gated on
    /// the operator's role; senior reviewers additionally need a proven
    /// track record before they may bulk-resolve.
    #[instrument(skip(self, ids, feedback), fields(operator.token = %operator))]
    pub async fn bulk_override(
        &self,
        operator: &OpaqueToken,
        ids: &[SubmissionId],
        outcome: Outcome,
        feedback: &str,
    ) -> Result<OverrideReport, ReviewError> {
        self.authorize_override(operator).await?;

        let mut report = OverrideReport::default();
        for &id in ids {
            match self
                .state_machine
                .override_decision(id, operator, outcome, feedback)
                .await
            {
                Ok(_) => report.succeeded.push(id),
                Err(e) => {
                    warn!(submission.id = %id, error = %e, "Bulk override item failed");
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Bulk override complete"
        );
        Ok(report)
    }

    async fn authorize_override(&self, operator: &OpaqueToken) -> Result<(), ReviewError> {
        let caps = self.directory.capabilities(operator).await?;
        if !caps.is_active || !caps.role.can_override() {
            return Err(ReviewError::PermissionDenied);
        }
        // Full operators are trusted by role; senior reviewers must have
        // earned standing in the current window.
        if caps.role == crate::external::Role::Operator {
            return Ok(());
        }
        let stats = self
            .tracker
            .stats(operator)
            .await
            .map_err(|_| ReviewError::PermissionDenied)?;
        if stats.performance_score < self.override_config.min_performance_score
            || stats.window_decisions < self.override_config.min_window_decisions
        {
            return Err(ReviewError::PermissionDenied);
        }
        Ok(())
    }

    /// Drive sweeps on the configured interval until shutdown signals.
    pub async fn run_periodic(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(self.sweep_config.interval_seconds));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_sweep().await {
                        error!(error = %e, "Sweep failed");
                    }
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Coordinator shutting down");
                        break;
                    }
                }
            }
        }
    }
}
