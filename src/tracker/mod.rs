//! Performance tracker: consumes decision events after commit and folds
//! them into rolling per-reviewer metrics. Processing is idempotent per
//! (submission, decision sequence), so redelivered events are harmless.

pub mod metrics;

use crate::config::TrackerConfig;
use crate::domain::{DecisionSample, OpaqueToken, RecognitionTier, RollingMetrics, SubmissionId};
use crate::error::ReviewError;
use crate::storage::ReviewStore;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshot of one reviewer's standing, for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewerStats {
    pub rolling: RollingMetrics,
    pub performance_score: f64,
    pub window_decisions: usize,
    pub tier: RecognitionTier,
}

pub struct PerformanceTracker {
    store: Arc<dyn ReviewStore>,
    config: TrackerConfig,
}

impl PerformanceTracker {
    pub fn new(store: Arc<dyn ReviewStore>, config: TrackerConfig) -> Self {
        Self { store, config }
    }

    /// Fold the latest decision on `submission_id` into its reviewer's
    /// metrics. Safe to call more than once per decision: a processed
    /// marker keyed by (submission, decision sequence) absorbs replays.
    pub async fn process(&self, submission_id: SubmissionId) -> Result<(), ReviewError> {
        let submission = self.store.get_submission(submission_id).await?;
        let decision = match submission.decision_history.last() {
            Some(d) => d.clone(),
            None => {
                warn!(submission.id = %submission_id, "Tracker event with no decision, skipping");
                return Ok(());
            }
        };
        let seq = submission.decision_history.len();

        if !self.store.mark_tracker_processed(submission_id, seq).await? {
            debug!(
                submission.id = %submission_id,
                seq = seq,
                "Decision already processed, skipping replay"
            );
            return Ok(());
        }

        let response_secs = match self.store.latest_assignment(submission_id).await? {
            Some(event) => (decision.decided_at - event.assigned_at)
                .num_seconds()
                .max(0) as f64,
            None => {
                // Operator overrides decide without an assignment; they
                // carry no review-effort signal and are not scored.
                debug!(submission.id = %submission_id, "No assignment event, skipping metrics");
                return Ok(());
            }
        };

        self.store.record_response_time(response_secs).await?;
        let median = self.store.median_response_time().await?.unwrap_or(0.0);

        let mut profile = self.store.get_profile(&decision.reviewer).await?;
        profile.samples.push(DecisionSample {
            decided_at: decision.decided_at,
            response_secs,
            outcome: decision.outcome,
        });
        let cutoff = Utc::now() - Duration::days(self.config.window_days);
        profile.samples.retain(|s| s.decided_at >= cutoff);

        let alpha = metrics::ewma_alpha(self.config.half_life_decisions);
        let sample = metrics::speed_sample(median, response_secs);
        profile.rolling.speed = metrics::ewma_update(profile.rolling.speed, sample, alpha);
        profile.rolling.approval_rate = metrics::approval_rate(&profile.samples);
        profile.rolling.volume =
            metrics::volume(profile.samples.len(), self.config.volume_target);
        profile.rolling.consistency = metrics::consistency(&profile.samples);
        profile.performance_score = metrics::performance_score(&profile.rolling, &self.config);

        info!(
            reviewer.token = %profile.token,
            performance_score = profile.performance_score,
            speed = profile.rolling.speed,
            window = profile.samples.len(),
            "Reviewer metrics updated"
        );
        self.store.upsert_profile(profile).await?;
        Ok(())
    }

    /// Current standing for one reviewer.
    pub async fn stats(&self, reviewer: &OpaqueToken) -> Result<ReviewerStats, ReviewError> {
        let profile = self.store.get_profile(reviewer).await?;
        let cutoff = Utc::now() - Duration::days(self.config.window_days);
        let window = profile.samples.iter().filter(|s| s.decided_at >= cutoff).count();
        Ok(ReviewerStats {
            rolling: profile.rolling,
            performance_score: profile.performance_score,
            window_decisions: window,
            tier: metrics::recognition_tier(profile.performance_score, window),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AssignmentEvent, Decision, Outcome, PriorityClass, ReviewerProfile, Submission,
    };
    use crate::storage::MemoryStore;

    fn tracker_config() -> TrackerConfig {
        TrackerConfig {
            half_life_decisions: 20,
            window_days: 30,
            volume_target: 30,
            speed_weight: 0.35,
            approval_weight: 0.25,
            volume_weight: 0.20,
            consistency_weight: 0.20,
        }
    }

    async fn decided_submission(store: &MemoryStore, reviewer: &OpaqueToken) -> Submission {
        let mut sub = Submission::new(OpaqueToken::from("c"), "t", PriorityClass::Normal, 0.5);
        let assigned_at = Utc::now() - Duration::hours(1);
        store
            .record_assignment(AssignmentEvent {
                submission_id: sub.id,
                reviewer: reviewer.clone(),
                assigned_at,
                score_at_assignment: 0.8,
            })
            .await
            .unwrap();
        sub.decision_history.push(Decision {
            submission_id: sub.id,
            reviewer: reviewer.clone(),
            outcome: Outcome::Approve,
            feedback: String::new(),
            decided_at: Utc::now(),
        });
        store.insert_submission(sub.clone()).await.unwrap();
        sub
    }

    #[tokio::test]
    async fn processing_updates_metrics_once() {
        let store = Arc::new(MemoryStore::new());
        let reviewer = OpaqueToken::from("rev-1");
        store
            .upsert_profile(ReviewerProfile::new(reviewer.clone(), 5))
            .await
            .unwrap();
        let sub = decided_submission(&store, &reviewer).await;

        let tracker = PerformanceTracker::new(store.clone(), tracker_config());
        tracker.process(sub.id).await.unwrap();

        let after_first = store.get_profile(&reviewer).await.unwrap();
        assert_eq!(after_first.samples.len(), 1);
        assert_eq!(after_first.rolling.approval_rate, 1.0);

        // Replay: identical event must not double-count.
        tracker.process(sub.id).await.unwrap();
        let after_replay = store.get_profile(&reviewer).await.unwrap();
        assert_eq!(after_replay.samples.len(), 1);
        assert_eq!(
            after_replay.performance_score,
            after_first.performance_score
        );
    }

    #[tokio::test]
    async fn faster_than_median_pushes_speed_up() {
        let store = Arc::new(MemoryStore::new());
        let reviewer = OpaqueToken::from("rev-fast");
        store
            .upsert_profile(ReviewerProfile::new(reviewer.clone(), 5))
            .await
            .unwrap();
        // Seed a slow global median so the 1-hour response reads as fast.
        for _ in 0..10 {
            store.record_response_time(36_000.0).await.unwrap();
        }
        let sub = decided_submission(&store, &reviewer).await;

        let tracker = PerformanceTracker::new(store.clone(), tracker_config());
        tracker.process(sub.id).await.unwrap();

        let profile = store.get_profile(&reviewer).await.unwrap();
        assert!(profile.rolling.speed > 0.5);
    }

    #[tokio::test]
    async fn stats_reports_tier_from_window() {
        let store = Arc::new(MemoryStore::new());
        let reviewer = OpaqueToken::from("rev-2");
        store
            .upsert_profile(ReviewerProfile::new(reviewer.clone(), 5))
            .await
            .unwrap();

        let tracker = PerformanceTracker::new(store.clone(), tracker_config());
        let stats = tracker.stats(&reviewer).await.unwrap();
        assert_eq!(stats.tier, RecognitionTier::Newcomer);
        assert_eq!(stats.window_decisions, 0);
    }
}
