// ABOUTME: In-memory profile store for tests and ephemeral single-process runs
// ABOUTME: DashMap keyed by user id; load/persist are no-ops
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use dashmap::DashMap;

use super::ProfileStore;
use crate::engine::profile::PreferenceProfile;
use crate::errors::AppResult;

/// In-memory profile store.
///
/// Nothing survives the process; useful for tests and for deployments that
/// accept ephemeral learning state.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<String, PreferenceProfile>,
}

impl InMemoryProfileStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of profiles currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the store holds no profiles
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, user_id: &str) -> PreferenceProfile {
        self.profiles
            .entry(user_id.to_owned())
            .or_insert_with(|| PreferenceProfile::new(user_id))
            .clone()
    }

    async fn save(&self, profile: PreferenceProfile) -> AppResult<()> {
        self.profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    async fn load_all(&self) -> AppResult<usize> {
        Ok(self.profiles.len())
    }

    async fn persist_all(&self) -> AppResult<usize> {
        Ok(self.profiles.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_creates_default_profile() {
        let store = InMemoryProfileStore::new();
        let profile = store.get("new-user").await;
        assert_eq!(profile.user_id, "new-user");
        assert_eq!(profile.total_interactions, 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = InMemoryProfileStore::new();
        let mut profile = store.get("u1").await;
        profile.total_interactions = 7;
        store.save(profile).await.unwrap();
        assert_eq!(store.get("u1").await.total_interactions, 7);
    }
}
