//! Storage contract for the pipeline. The compare-and-swap on submission
//! status is the single linearization point for every workflow transition;
//! workload counters move through dedicated atomic primitives so the
//! workload-sum invariant holds under concurrent sweeps.

pub mod memory;

pub use memory::MemoryStore;

use crate::domain::{
    AssignmentEvent, OpaqueToken, ReviewStatus, ReviewerProfile, Submission, SubmissionId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("submission not found: {0}")]
    SubmissionNotFound(SubmissionId),

    #[error("reviewer profile not found")]
    ProfileNotFound,

    #[error("status conflict: expected {expected}, found {actual}")]
    StatusConflict {
        expected: ReviewStatus,
        actual: ReviewStatus,
    },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Record mutation applied inside a transition's critical section.
pub type Mutation = Box<dyn FnOnce(&mut Submission) + Send>;

#[async_trait]
pub trait ReviewStore: Send + Sync {
    // --- submissions ---

    async fn insert_submission(&self, submission: Submission) -> Result<(), StoreError>;

    async fn get_submission(&self, id: SubmissionId) -> Result<Submission, StoreError>;

    /// Full-record update for out-of-band edits. Never use this alongside
    /// a status change; transitions go through
    /// [`transition_submission`](ReviewStore::transition_submission).
    async fn update_submission(&self, submission: Submission) -> Result<(), StoreError>;

    async fn submissions_with_status(
        &self,
        status: ReviewStatus,
    ) -> Result<Vec<Submission>, StoreError>;

    async fn submissions_assigned_to(
        &self,
        reviewer: &OpaqueToken,
    ) -> Result<Vec<Submission>, StoreError>;

    async fn submissions_by_contributor(
        &self,
        contributor: &OpaqueToken,
    ) -> Result<Vec<Submission>, StoreError>;

    /// Atomically move `id` from `expected` to `next`, stamping
    /// `status_changed_at`. Returns the post-swap record on success and
    /// `StatusConflict` when another writer got there first. This is the
    /// only way a status may change.
    async fn compare_and_swap_status(
        &self,
        id: SubmissionId,
        expected: ReviewStatus,
        next: ReviewStatus,
    ) -> Result<Submission, StoreError>;

    /// [`compare_and_swap_status`](ReviewStore::compare_and_swap_status)
    /// that also applies `apply` to the record inside the same critical
    /// section. Fields that travel with a transition (assignee, decision
    /// history, priority score) can never be observed out of step with the
    /// status, and a lost swap leaves the record untouched. `apply` runs
    /// before the status and stamp are written, so it cannot commit a
    /// status of its own.
    async fn transition_submission(
        &self,
        id: SubmissionId,
        expected: ReviewStatus,
        next: ReviewStatus,
        apply: Mutation,
    ) -> Result<Submission, StoreError>;

    // --- reviewer profiles ---

    async fn upsert_profile(&self, profile: ReviewerProfile) -> Result<(), StoreError>;

    async fn get_profile(&self, token: &OpaqueToken) -> Result<ReviewerProfile, StoreError>;

    async fn list_profiles(&self) -> Result<Vec<ReviewerProfile>, StoreError>;

    /// Atomically increment the reviewer's workload and stamp
    /// `last_assigned_at`. Returns the new workload.
    async fn mark_assigned(
        &self,
        token: &OpaqueToken,
        at: DateTime<Utc>,
    ) -> Result<u32, StoreError>;

    /// Atomically decrement the reviewer's workload, saturating at zero.
    /// Returns the new workload.
    async fn release_workload(&self, token: &OpaqueToken) -> Result<u32, StoreError>;

    // --- assignment audit trail ---

    async fn record_assignment(&self, event: AssignmentEvent) -> Result<(), StoreError>;

    /// Most recent assignment of `id`, if any. Used for response-time
    /// measurement at decision time.
    async fn latest_assignment(
        &self,
        id: SubmissionId,
    ) -> Result<Option<AssignmentEvent>, StoreError>;

    async fn assignment_events(
        &self,
        id: SubmissionId,
    ) -> Result<Vec<AssignmentEvent>, StoreError>;

    // --- idempotence markers ---

    /// Record that the tracker consumed decision `seq` of `id`. Returns
    /// true when this call inserted the marker, false on replay.
    async fn mark_tracker_processed(
        &self,
        id: SubmissionId,
        seq: usize,
    ) -> Result<bool, StoreError>;

    /// Record that `id` was handed to the publisher. Returns true on first
    /// call, false on replay.
    async fn mark_published(&self, id: SubmissionId) -> Result<bool, StoreError>;

    // --- global response-time statistics ---

    async fn record_response_time(&self, secs: f64) -> Result<(), StoreError>;

    /// Median of recently recorded response times, if any exist.
    async fn median_response_time(&self) -> Result<Option<f64>, StoreError>;
}
