// Review Pipeline Library - anonymous volunteer content review
// This exposes the core components for testing and integration

pub mod assignment;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod domain;
pub mod error;
pub mod external;
pub mod pipeline;
pub mod review;
pub mod storage;
pub mod telemetry;
pub mod tracker;

// Re-export key types for easy access
pub use assignment::{AssignmentEngine, AssignmentProposal};
pub use config::{config, init_config, ReviewPipelineConfig};
pub use coordinator::{BatchCoordinator, OverrideReport, SweepReport};
pub use directory::ReviewerDirectory;
pub use domain::{
    OpaqueToken, Outcome, PriorityClass, RecognitionTier, ReviewStatus, ReviewerProfile,
    ReviewerView, Submission, SubmissionId,
};
pub use error::ReviewError;
pub use external::{Capabilities, IdentityResolver, Notifier, Publisher, Role};
pub use pipeline::{ReviewPipeline, SubmissionStatus};
pub use review::ReviewStateMachine;
pub use storage::{MemoryStore, ReviewStore, StoreError};
pub use telemetry::{
    create_review_span, generate_correlation_id, init_telemetry, shutdown_telemetry,
};
pub use tracker::{PerformanceTracker, ReviewerStats};
