//! In-memory reference implementation of [`ReviewStore`]. A single mutex
//! around the whole state keeps every primitive trivially atomic; the
//! critical sections are short and never await.

use super::{Mutation, ReviewStore, StoreError};
use crate::domain::{
    AssignmentEvent, OpaqueToken, ReviewStatus, ReviewerProfile, Submission, SubmissionId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Recent response-time samples retained for the global median.
const RESPONSE_SAMPLE_CAP: usize = 500;

#[derive(Default)]
struct Inner {
    submissions: HashMap<SubmissionId, Submission>,
    profiles: HashMap<OpaqueToken, ReviewerProfile>,
    assignments: HashMap<SubmissionId, Vec<AssignmentEvent>>,
    tracker_markers: HashSet<(SubmissionId, usize)>,
    published: HashSet<SubmissionId>,
    response_times: VecDeque<f64>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_submission(&self, submission: Submission) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.submissions.insert(submission.id, submission);
        Ok(())
    }

    async fn get_submission(&self, id: SubmissionId) -> Result<Submission, StoreError> {
        let inner = self.lock()?;
        inner
            .submissions
            .get(&id)
            .cloned()
            .ok_or(StoreError::SubmissionNotFound(id))
    }

    async fn update_submission(&self, submission: Submission) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.submissions.contains_key(&submission.id) {
            return Err(StoreError::SubmissionNotFound(submission.id));
        }
        inner.submissions.insert(submission.id, submission);
        Ok(())
    }

    async fn submissions_with_status(
        &self,
        status: ReviewStatus,
    ) -> Result<Vec<Submission>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .submissions
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    async fn submissions_assigned_to(
        &self,
        reviewer: &OpaqueToken,
    ) -> Result<Vec<Submission>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .submissions
            .values()
            .filter(|s| s.assigned_reviewer.as_ref() == Some(reviewer))
            .cloned()
            .collect())
    }

    async fn submissions_by_contributor(
        &self,
        contributor: &OpaqueToken,
    ) -> Result<Vec<Submission>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .submissions
            .values()
            .filter(|s| s.contributor == *contributor)
            .cloned()
            .collect())
    }

    async fn compare_and_swap_status(
        &self,
        id: SubmissionId,
        expected: ReviewStatus,
        next: ReviewStatus,
    ) -> Result<Submission, StoreError> {
        self.transition_submission(id, expected, next, Box::new(|_: &mut Submission| {}))
            .await
    }

    async fn transition_submission(
        &self,
        id: SubmissionId,
        expected: ReviewStatus,
        next: ReviewStatus,
        apply: Mutation,
    ) -> Result<Submission, StoreError> {
        let mut inner = self.lock()?;
        let submission = inner
            .submissions
            .get_mut(&id)
            .ok_or(StoreError::SubmissionNotFound(id))?;
        if submission.status != expected {
            return Err(StoreError::StatusConflict {
                expected,
                actual: submission.status,
            });
        }
        apply(submission);
        // Status and stamp are written last so the mutation cannot smuggle
        // in a status of its own.
        submission.status = next;
        submission.status_changed_at = Utc::now();
        Ok(submission.clone())
    }

    async fn upsert_profile(&self, profile: ReviewerProfile) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.profiles.insert(profile.token.clone(), profile);
        Ok(())
    }

    async fn get_profile(&self, token: &OpaqueToken) -> Result<ReviewerProfile, StoreError> {
        let inner = self.lock()?;
        inner
            .profiles
            .get(token)
            .cloned()
            .ok_or(StoreError::ProfileNotFound)
    }

    async fn list_profiles(&self) -> Result<Vec<ReviewerProfile>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.profiles.values().cloned().collect())
    }

    async fn mark_assigned(
        &self,
        token: &OpaqueToken,
        at: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let mut inner = self.lock()?;
        let profile = inner
            .profiles
            .get_mut(token)
            .ok_or(StoreError::ProfileNotFound)?;
        profile.workload_current += 1;
        profile.last_assigned_at = Some(at);
        Ok(profile.workload_current)
    }

    async fn release_workload(&self, token: &OpaqueToken) -> Result<u32, StoreError> {
        let mut inner = self.lock()?;
        let profile = inner
            .profiles
            .get_mut(token)
            .ok_or(StoreError::ProfileNotFound)?;
        profile.workload_current = profile.workload_current.saturating_sub(1);
        Ok(profile.workload_current)
    }

    async fn record_assignment(&self, event: AssignmentEvent) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner
            .assignments
            .entry(event.submission_id)
            .or_default()
            .push(event);
        Ok(())
    }

    async fn latest_assignment(
        &self,
        id: SubmissionId,
    ) -> Result<Option<AssignmentEvent>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .assignments
            .get(&id)
            .and_then(|events| events.last().cloned()))
    }

    async fn assignment_events(
        &self,
        id: SubmissionId,
    ) -> Result<Vec<AssignmentEvent>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.assignments.get(&id).cloned().unwrap_or_default())
    }

    async fn mark_tracker_processed(
        &self,
        id: SubmissionId,
        seq: usize,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.tracker_markers.insert((id, seq)))
    }

    async fn mark_published(&self, id: SubmissionId) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.published.insert(id))
    }

    async fn record_response_time(&self, secs: f64) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.response_times.len() == RESPONSE_SAMPLE_CAP {
            inner.response_times.pop_front();
        }
        inner.response_times.push_back(secs);
        Ok(())
    }

    async fn median_response_time(&self) -> Result<Option<f64>, StoreError> {
        let inner = self.lock()?;
        if inner.response_times.is_empty() {
            return Ok(None);
        }
        let mut sorted: Vec<f64> = inner.response_times.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        Ok(Some(median))
    }
}
