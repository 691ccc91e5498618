//! Shared test fixtures: in-process fakes for the external collaborators
//! plus a fully wired pipeline harness over the in-memory store.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use async_trait::async_trait;
use review_pipeline::{
    Capabilities, IdentityResolver, MemoryStore, Notifier, OpaqueToken, Publisher,
    ReviewPipeline, ReviewPipelineConfig, Role,
};
use review_pipeline::external::ExternalError;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct StaticResolver {
    map: Mutex<HashMap<OpaqueToken, Capabilities>>,
}

impl StaticResolver {
    pub fn insert(&self, token: &OpaqueToken, role: Role, preferences: &[&str]) {
        let caps = Capabilities {
            role,
            category_preferences: preferences.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            is_active: true,
        };
        self.map
            .lock()
            .expect("resolver lock")
            .insert(token.clone(), caps);
    }

    pub fn deactivate(&self, token: &OpaqueToken) {
        if let Some(caps) = self.map.lock().expect("resolver lock").get_mut(token) {
            caps.is_active = false;
        }
    }
}

#[async_trait]
impl IdentityResolver for StaticResolver {
    async fn resolve(&self, token: &OpaqueToken) -> Result<Capabilities, ExternalError> {
        self.map
            .lock()
            .expect("resolver lock")
            .get(token)
            .cloned()
            .ok_or_else(|| ExternalError::Resolution(token.to_string()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<(OpaqueToken, String)>>,
    pub alerts: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &OpaqueToken, message: &str) -> Result<(), ExternalError> {
        self.notifications
            .lock()
            .expect("notifier lock")
            .push((recipient.clone(), message.to_string()));
        Ok(())
    }

    async fn alert(&self, message: &str) -> Result<(), ExternalError> {
        self.alerts
            .lock()
            .expect("notifier lock")
            .push(message.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<String>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, submission_id: &str) -> Result<(), ExternalError> {
        self.published
            .lock()
            .expect("publisher lock")
            .push(submission_id.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub pipeline: ReviewPipeline,
    pub store: Arc<MemoryStore>,
    pub resolver: Arc<StaticResolver>,
    pub notifier: Arc<RecordingNotifier>,
    pub publisher: Arc<RecordingPublisher>,
}

pub fn harness() -> Harness {
    harness_with(ReviewPipelineConfig::default())
}

pub fn harness_with(config: ReviewPipelineConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let resolver = Arc::new(StaticResolver::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let pipeline = ReviewPipeline::new(
        store.clone(),
        resolver.clone(),
        notifier.clone(),
        publisher.clone(),
        config,
    );
    Harness {
        pipeline,
        store,
        resolver,
        notifier,
        publisher,
    }
}

impl Harness {
    pub async fn add_reviewer(&self, token: &str, role: Role, preferences: &[&str]) -> OpaqueToken {
        let token = OpaqueToken::from(token);
        self.resolver.insert(&token, role, preferences);
        self.pipeline
            .grant_reviewer(&token)
            .await
            .expect("grant reviewer");
        token
    }
}
