// ABOUTME: Profile store abstraction with pluggable backing and per-user write serialization
// ABOUTME: Backends: in-memory (tests, ephemeral runs) and JSON file (single-node durable)
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Profile Store
//!
//! Durable mapping from user id to [`PreferenceProfile`] behind a trait, so
//! the serialization format stays isolated from engine logic. `get` never
//! fails: an unknown user receives a default profile. A corrupt persisted
//! store is logged and replaced by an empty in-memory map; data for that run
//! is ephemeral until the next successful save.
//!
//! Concurrency: read-modify-write cycles for the *same* user must be
//! serialized to avoid lost updates, while different users must not block
//! each other. [`UserLockRegistry`] provides the per-user mutual-exclusion
//! scope the learner holds across get → mutate → save.

/// JSON file backed store
pub mod file;
/// In-memory store
pub mod memory;

pub use file::JsonFileStore;
pub use memory::InMemoryProfileStore;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::engine::profile::PreferenceProfile;
use crate::errors::AppResult;

/// Pluggable profile persistence backend
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile for `user_id`, creating one with documented defaults
    /// if absent. Never fails.
    async fn get(&self, user_id: &str) -> PreferenceProfile;

    /// Persist `profile`, overwriting any previous version (idempotent).
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage rejects the write; the
    /// in-memory state is updated regardless, so the run continues with the
    /// newest profile and the write can be retried at shutdown.
    async fn save(&self, profile: PreferenceProfile) -> AppResult<()>;

    /// Load every persisted profile at process start, returning the count.
    ///
    /// # Errors
    ///
    /// Never fails on corrupt data (that is recovered by starting empty);
    /// only unexpected I/O failures surface.
    async fn load_all(&self) -> AppResult<usize>;

    /// Flush every profile to durable storage, returning the count written.
    ///
    /// Must be called before process shutdown so the most recent learning
    /// updates are not lost.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush could not be completed.
    async fn persist_all(&self) -> AppResult<usize>;
}

/// Per-user mutual exclusion for profile read-modify-write cycles.
///
/// Lock granularity is the user id: holders for different users proceed in
/// parallel, holders for the same user queue up.
#[derive(Default)]
pub struct UserLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl UserLockRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock guarding `user_id`
    #[must_use]
    pub fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_user_lock_is_shared() {
        let registry = UserLockRegistry::new();
        let a = registry.lock_for("u1");
        let b = registry.lock_for("u1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_different_users_do_not_share_locks() {
        let registry = UserLockRegistry::new();
        let a = registry.lock_for("u1");
        let b = registry.lock_for("u2");
        assert!(!Arc::ptr_eq(&a, &b));

        // Holding u1 must not prevent locking u2.
        let _guard = a.lock().await;
        let second = b.try_lock();
        assert!(second.is_ok());
    }
}
