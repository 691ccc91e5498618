//! End-to-end workflow tests over the wired pipeline: submission intake,
//! assignment, decisions, revision cycles, and publication.

mod common;

use common::harness;
use review_pipeline::{OpaqueToken, Outcome, PriorityClass, ReviewError, ReviewStatus, Role};

#[tokio::test]
async fn submission_flows_from_intake_to_publication() {
    let h = harness();
    let reviewer = h.add_reviewer("rev-1", Role::Reviewer, &["tactics"]).await;
    let contributor = OpaqueToken::from("contrib-1");

    let id = h
        .pipeline
        .submit(contributor.clone(), "tactics", PriorityClass::Normal, 0.5)
        .await
        .unwrap();

    let status = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(status.status, ReviewStatus::Queued);
    assert_eq!(status.queue_position, Some(1));
    assert!(!status.assignee_present);

    let report = h.pipeline.run_sweep().await.unwrap();
    assert_eq!(report.assigned, 1);

    let status = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(status.status, ReviewStatus::Assigned);
    assert!(status.assignee_present);
    assert!(status.queue_position.is_none());

    h.pipeline.start_review(id, &reviewer).await.unwrap();
    let status = h
        .pipeline
        .decide(id, &reviewer, Outcome::Approve, "solid analysis")
        .await
        .unwrap();
    assert_eq!(status.status, ReviewStatus::Approved);

    // Exactly one publish call, exactly one approve entry.
    let published = h.publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0], id.to_string());
    drop(published);

    let submission = h.store_submission(id).await;
    assert_eq!(submission.decision_history.len(), 1);
    assert_eq!(submission.decision_history[0].outcome, Outcome::Approve);

    // Contributor was told; reviewer workload slot came back.
    let notes = h.notifier.notifications.lock().unwrap();
    assert!(notes.iter().any(|(to, _)| *to == contributor));
}

#[tokio::test]
async fn terminal_submissions_reject_further_decisions() {
    let h = harness();
    let reviewer = h.add_reviewer("rev-1", Role::Reviewer, &[]).await;
    let id = h
        .pipeline
        .submit(OpaqueToken::from("c"), "openings", PriorityClass::Normal, 0.3)
        .await
        .unwrap();
    h.pipeline.run_sweep().await.unwrap();
    h.pipeline
        .decide(id, &reviewer, Outcome::Reject, "off topic")
        .await
        .unwrap();

    let err = h
        .pipeline
        .decide(id, &reviewer, Outcome::Approve, "")
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::InvalidTransition { .. }));

    // Rejections are never published.
    assert!(h.publisher.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn reject_and_revise_require_feedback() {
    let h = harness();
    let reviewer = h.add_reviewer("rev-1", Role::Reviewer, &[]).await;
    let id = h
        .pipeline
        .submit(OpaqueToken::from("c"), "openings", PriorityClass::Normal, 0.3)
        .await
        .unwrap();
    h.pipeline.run_sweep().await.unwrap();

    for outcome in [Outcome::Reject, Outcome::Revise] {
        let err = h
            .pipeline
            .decide(id, &reviewer, outcome, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::FeedbackRequired));
    }

    // Approvals carry no such requirement.
    h.pipeline
        .decide(id, &reviewer, Outcome::Approve, "")
        .await
        .unwrap();
}

#[tokio::test]
async fn revision_cycle_requeues_until_cap_then_escalates() {
    let h = harness();
    let reviewer = h.add_reviewer("rev-1", Role::Reviewer, &[]).await;
    let contributor = OpaqueToken::from("contrib-1");
    let id = h
        .pipeline
        .submit(contributor.clone(), "endgames", PriorityClass::Normal, 0.7)
        .await
        .unwrap();

    // Cap is 3: three full revise/resubmit cycles succeed.
    for round in 1..=3u32 {
        h.pipeline.run_sweep().await.unwrap();
        h.pipeline
            .decide(id, &reviewer, Outcome::Revise, "needs work")
            .await
            .unwrap();
        let status = h.pipeline.resubmit(id, &contributor).await.unwrap();
        assert_eq!(status.status, ReviewStatus::Queued);
        assert_eq!(status.revision_count, round);
    }

    // Fourth revision request hits the cap on resubmit.
    h.pipeline.run_sweep().await.unwrap();
    h.pipeline
        .decide(id, &reviewer, Outcome::Revise, "still needs work")
        .await
        .unwrap();
    let err = h.pipeline.resubmit(id, &contributor).await.unwrap_err();
    assert!(matches!(err, ReviewError::RevisionLimitExceeded));

    // Routed to the senior queue, not dropped.
    let status = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(status.status, ReviewStatus::Escalated);
    assert!(!h.notifier.alerts.lock().unwrap().is_empty());

    // Junior reviewers cannot pick it up; a senior can.
    let report = h.pipeline.run_sweep().await.unwrap();
    assert_eq!(report.assigned, 0);
    assert_eq!(report.unassigned, 1);

    h.add_reviewer("rev-senior", Role::SeniorReviewer, &[]).await;
    let report = h.pipeline.run_sweep().await.unwrap();
    assert_eq!(report.assigned, 1);
    let status = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(status.status, ReviewStatus::Assigned);
}

#[tokio::test]
async fn resubmit_is_contributor_only() {
    let h = harness();
    let reviewer = h.add_reviewer("rev-1", Role::Reviewer, &[]).await;
    let id = h
        .pipeline
        .submit(OpaqueToken::from("contrib-1"), "t", PriorityClass::Normal, 0.5)
        .await
        .unwrap();
    h.pipeline.run_sweep().await.unwrap();
    h.pipeline
        .decide(id, &reviewer, Outcome::Revise, "fix diagrams")
        .await
        .unwrap();

    let err = h
        .pipeline
        .resubmit(id, &OpaqueToken::from("someone-else"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::PermissionDenied));
}

#[tokio::test]
async fn contributor_dashboard_lists_own_submissions_with_feedback() {
    let h = harness();
    let reviewer = h.add_reviewer("rev-1", Role::Reviewer, &[]).await;
    let contributor = OpaqueToken::from("contrib-1");

    let first = h
        .pipeline
        .submit(contributor.clone(), "tactics", PriorityClass::Normal, 0.5)
        .await
        .unwrap();
    h.pipeline
        .submit(contributor.clone(), "openings", PriorityClass::Low, 0.2)
        .await
        .unwrap();
    h.pipeline
        .submit(OpaqueToken::from("other"), "tactics", PriorityClass::Normal, 0.5)
        .await
        .unwrap();

    h.pipeline.run_sweep().await.unwrap();
    // Sweep order favors the normal-priority tactics item; decide whichever
    // of the contributor's items got assigned.
    if h.pipeline.get_status(first).await.unwrap().assignee_present {
        h.pipeline
            .decide(first, &reviewer, Outcome::Revise, "expand the intro")
            .await
            .unwrap();
    }

    let dashboard = h.pipeline.contributor_dashboard(&contributor).await.unwrap();
    assert_eq!(dashboard.len(), 2);
    assert!(dashboard
        .iter()
        .any(|s| s.latest_feedback.as_deref() == Some("expand the intro")));
}

impl common::Harness {
    async fn store_submission(
        &self,
        id: review_pipeline::SubmissionId,
    ) -> review_pipeline::Submission {
        use review_pipeline::ReviewStore;
        self.store.get_submission(id).await.unwrap()
    }
}
