use crate::domain::ReviewStatus;
use crate::storage::StoreError;
use thiserror::Error;

/// Typed failure taxonomy for every pipeline operation. Nothing here ever
/// crosses a component boundary as a panic; sweeps skip-and-log on all
/// classes except `InvariantViolation`, which additionally quarantines the
/// submission and raises an operator alert.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("invalid transition: {operation} not permitted from {from}")]
    InvalidTransition {
        from: ReviewStatus,
        operation: &'static str,
    },

    #[error("submission already assigned")]
    AlreadyAssigned,

    #[error("reviewer unavailable or at workload cap")]
    ReviewerUnavailable,

    #[error("decision rejected: reviewer is not the current assignee")]
    UnauthorizedReviewer,

    #[error("no eligible reviewer for submission")]
    NoEligibleReviewer,

    #[error("revision limit exceeded")]
    RevisionLimitExceeded,

    #[error("feedback is mandatory for this outcome")]
    FeedbackRequired,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("submission changed mid-sweep, skipped")]
    StaleSweepSkip,

    #[error("submission not found")]
    NotFound,

    #[error("operation requires elevated capability")]
    PermissionDenied,

    #[error("identity resolution failed: {0}")]
    Identity(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReviewError {
    /// True for the single fatal class: the coordinator alerts instead of
    /// merely logging, and the submission is quarantined.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, ReviewError::InvariantViolation(_))
    }

    /// Short, token-free message safe to surface to end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            ReviewError::InvalidTransition { .. } => "This action is not possible right now.",
            ReviewError::AlreadyAssigned => "This submission was just picked up by someone else.",
            ReviewError::ReviewerUnavailable => "That reviewer cannot take more work right now.",
            ReviewError::UnauthorizedReviewer => "You are not the assigned reviewer for this item.",
            ReviewError::NoEligibleReviewer => {
                "No reviewer is available yet; your submission stays queued."
            }
            ReviewError::RevisionLimitExceeded => {
                "The revision limit was reached; a senior reviewer will take over."
            }
            ReviewError::FeedbackRequired => "Feedback is required for this decision.",
            ReviewError::InvariantViolation(_) => {
                "This submission needs manual attention; the team has been alerted."
            }
            ReviewError::StaleSweepSkip => "This item changed and will be retried shortly.",
            ReviewError::NotFound => "Submission not found.",
            ReviewError::PermissionDenied => "You do not have permission for this action.",
            ReviewError::Identity(_) => "Your account could not be verified right now.",
            ReviewError::Store(_) => "A storage problem occurred; please try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_never_leak_tokens() {
        let errors = [
            ReviewError::AlreadyAssigned,
            ReviewError::UnauthorizedReviewer,
            ReviewError::InvariantViolation("reviewer token rev-123 missing".to_string()),
        ];
        for e in &errors {
            assert!(!e.user_message().contains("rev-123"));
            assert!(!e.user_message().is_empty());
        }
    }

    #[test]
    fn only_invariant_violation_is_fatal_class() {
        assert!(ReviewError::InvariantViolation("x".into()).is_invariant_violation());
        assert!(!ReviewError::AlreadyAssigned.is_invariant_violation());
        assert!(!ReviewError::StaleSweepSkip.is_invariant_violation());
    }
}
