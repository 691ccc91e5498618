pub mod types;

pub use types::{
    AssignmentEvent, Decision, DecisionSample, OpaqueToken, Outcome, PriorityClass,
    RecognitionTier, ReviewStatus, ReviewerProfile, ReviewerView, RollingMetrics, Submission,
    SubmissionId,
};
