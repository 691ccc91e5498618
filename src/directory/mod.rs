//! Reviewer directory: merges stored workload/metrics with externally
//! resolved capabilities, behind a short-TTL cache so sweeps do not hammer
//! the identity subsystem.

use crate::config::DirectoryConfig;
use crate::domain::{OpaqueToken, ReviewerProfile, ReviewerView};
use crate::error::ReviewError;
use crate::external::{Capabilities, IdentityResolver};
use crate::storage::ReviewStore;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ReviewerDirectory {
    resolver: Arc<dyn IdentityResolver>,
    store: Arc<dyn ReviewStore>,
    cache: Cache<OpaqueToken, Capabilities>,
    default_workload_cap: u32,
}

impl ReviewerDirectory {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        store: Arc<dyn ReviewStore>,
        config: &DirectoryConfig,
        default_workload_cap: u32,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_cached_profiles)
            .time_to_live(Duration::from_secs(config.capability_ttl_seconds))
            .build();
        Self {
            resolver,
            store,
            cache,
            default_workload_cap,
        }
    }

    /// Resolve capabilities for a token, serving from cache within the TTL.
    /// Concurrent lookups for the same token coalesce into one resolution.
    pub async fn capabilities(&self, token: &OpaqueToken) -> Result<Capabilities, ReviewError> {
        let resolver = Arc::clone(&self.resolver);
        let key = token.clone();
        self.cache
            .try_get_with(key.clone(), async move { resolver.resolve(&key).await })
            .await
            .map_err(|e| ReviewError::Identity(e.to_string()))
    }

    /// Drop the cached entry so the next lookup re-resolves. Called after
    /// any lifecycle change that alters what the token may do.
    pub async fn invalidate(&self, token: &OpaqueToken) {
        self.cache.invalidate(token).await;
    }

    /// Admit a token into the reviewer pool. Creates the stored profile on
    /// first grant; re-granting a revoked reviewer reactivates the profile
    /// without resetting accumulated metrics.
    pub async fn grant_reviewer(&self, token: &OpaqueToken) -> Result<(), ReviewError> {
        match self.store.get_profile(token).await {
            Ok(mut profile) => {
                profile.available = true;
                self.store.upsert_profile(profile).await?;
                info!(reviewer.token = %token, "Reviewer reactivated");
            }
            Err(_) => {
                let profile = ReviewerProfile::new(token.clone(), self.default_workload_cap);
                self.store.upsert_profile(profile).await?;
                info!(reviewer.token = %token, "Reviewer profile created");
            }
        }
        self.invalidate(token).await;
        Ok(())
    }

    /// Remove a token from the assignment pool. The profile and its history
    /// are kept; only availability flips.
    pub async fn revoke(&self, token: &OpaqueToken) -> Result<(), ReviewError> {
        let mut profile = self.store.get_profile(token).await?;
        profile.available = false;
        self.store.upsert_profile(profile).await?;
        self.invalidate(token).await;
        info!(reviewer.token = %token, "Reviewer revoked from assignment pool");
        Ok(())
    }

    /// Point-in-time eligibility snapshot for the assignment engine.
    /// Reviewers whose capabilities cannot be resolved, or who are inactive
    /// on the identity side, are skipped rather than failing the snapshot.
    pub async fn snapshot(&self) -> Result<Vec<ReviewerView>, ReviewError> {
        let profiles = self.store.list_profiles().await?;
        let mut views = Vec::with_capacity(profiles.len());

        for profile in profiles {
            if !profile.available {
                continue;
            }
            let caps = match self.capabilities(&profile.token).await {
                Ok(caps) => caps,
                Err(e) => {
                    warn!(
                        reviewer.token = %profile.token,
                        error = %e,
                        "Skipping reviewer: capability resolution failed"
                    );
                    continue;
                }
            };
            if !caps.is_active || !caps.role.can_review() {
                debug!(reviewer.token = %profile.token, "Skipping inactive or non-reviewer token");
                continue;
            }
            views.push(ReviewerView {
                token: profile.token,
                category_preferences: caps.category_preferences,
                senior: caps.role.is_senior(),
                available: profile.available,
                workload_current: profile.workload_current,
                workload_cap: profile.workload_cap,
                performance_score: profile.performance_score,
                speed: profile.rolling.speed,
                last_assigned_at: profile.last_assigned_at,
            });
        }

        Ok(views)
    }
}
