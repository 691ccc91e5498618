use super::scoring;
use crate::config::AssignmentConfig;
use crate::domain::{ReviewerView, Submission};
use crate::error::ReviewError;
use tracing::debug;

/// A proposal the caller may try to commit. Carries the score so the
/// eventual assignment event records why this reviewer was picked.
#[derive(Debug, Clone)]
pub struct AssignmentProposal {
    pub reviewer: ReviewerView,
    pub score: f64,
}

/// Propose-only engine: reads a snapshot, never mutates anything.
/// Committing a proposal (and losing the race for it) is the state
/// machine's job.
pub struct AssignmentEngine {
    config: AssignmentConfig,
}

impl AssignmentEngine {
    pub fn new(config: AssignmentConfig) -> Self {
        Self { config }
    }

    pub fn propose(
        &self,
        pool: &[ReviewerView],
        submission: &Submission,
    ) -> Result<AssignmentProposal, ReviewError> {
        let picked =
            scoring::select(pool, submission, &self.config).ok_or(ReviewError::NoEligibleReviewer)?;
        let score = scoring::score(picked, submission, &self.config);
        debug!(
            submission.id = %submission.id,
            reviewer.token = %picked.token,
            score = score,
            pool_size = pool.len(),
            "Assignment proposed"
        );
        Ok(AssignmentProposal {
            reviewer: picked.clone(),
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OpaqueToken, PriorityClass};
    use std::collections::BTreeSet;

    fn engine() -> AssignmentEngine {
        AssignmentEngine::new(AssignmentConfig {
            workload_weight: 0.4,
            category_weight: 0.3,
            performance_weight: 0.3,
            default_workload_cap: 5,
            urgent_speed_percentile: 0.75,
        })
    }

    #[test]
    fn empty_pool_yields_no_eligible_reviewer() {
        let sub = Submission::new(OpaqueToken::from("c"), "t", PriorityClass::Normal, 0.5);
        let err = engine().propose(&[], &sub).unwrap_err();
        assert!(matches!(err, ReviewError::NoEligibleReviewer));
    }

    #[test]
    fn proposal_reports_the_winning_score() {
        let sub = Submission::new(OpaqueToken::from("c"), "tactics", PriorityClass::Normal, 0.5);
        let pool = vec![ReviewerView {
            token: OpaqueToken::from("rev-1"),
            category_preferences: BTreeSet::from(["tactics".to_string()]),
            senior: false,
            available: true,
            workload_current: 0,
            workload_cap: 5,
            performance_score: 0.5,
            speed: 0.5,
            last_assigned_at: None,
        }];
        let proposal = engine().propose(&pool, &sub).unwrap();
        assert_eq!(proposal.reviewer.token, OpaqueToken::from("rev-1"));
        // 0.4·1.0 headroom + 0.3·1.0 category + 0.3·0.5 performance
        assert!((proposal.score - 0.85).abs() < 1e-9);
    }
}
