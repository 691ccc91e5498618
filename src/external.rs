//! Seams to the systems this crate deliberately does not own: identity,
//! notification delivery, and content publication. Each is a small async
//! trait so tests can substitute in-process fakes.

use crate::domain::OpaqueToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Role granted by the identity subsystem. Ordering matters: each role
/// includes the capabilities of the ones below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Contributor,
    Reviewer,
    SeniorReviewer,
    Operator,
}

impl Role {
    pub fn can_review(self) -> bool {
        self >= Role::Reviewer
    }

    pub fn is_senior(self) -> bool {
        self >= Role::SeniorReviewer
    }

    /// Bulk override and quarantine resolution require operator trust.
    pub fn can_override(self) -> bool {
        matches!(self, Role::SeniorReviewer | Role::Operator)
    }
}

/// Capability facts resolved for one opaque token. The pipeline caches
/// these briefly; the identity subsystem remains the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub role: Role,
    pub category_preferences: BTreeSet<String>,
    pub is_active: bool,
}

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("identity resolution failed for token: {0}")]
    Resolution(String),

    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("publication failed: {0}")]
    Publication(String),
}

/// Resolves what an opaque token is allowed to do. Never exposes who the
/// token belongs to.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &OpaqueToken) -> Result<Capabilities, ExternalError>;
}

/// Outbound notifications. Failures here never fail the operation that
/// triggered them; callers log and continue.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Routine notification to a token holder (assignment, decision, requeue).
    async fn notify(&self, recipient: &OpaqueToken, message: &str) -> Result<(), ExternalError>;

    /// Operator-channel alert for conditions needing human attention.
    async fn alert(&self, message: &str) -> Result<(), ExternalError>;
}

/// Makes approved content publicly visible. Must tolerate redelivery:
/// the pipeline guarantees at-most-once invocation per submission, but a
/// durable backend may still see retries after a crash.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, submission_id: &str) -> Result<(), ExternalError>;
}
