// ABOUTME: JSON file backed profile store with atomic writes and corruption recovery
// ABOUTME: Whole-map serialization keyed by user id, temp file + rename on persist
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::ProfileStore;
use crate::engine::profile::PreferenceProfile;
use crate::errors::{AppError, AppResult};

/// Profile store persisted as a single JSON object keyed by user id.
///
/// The whole map is rewritten on every save; profile maps are small (one
/// entry per user of a single deployment) and the atomic temp-file + rename
/// keeps a crash from ever leaving a half-written store behind. Corrupt or
/// unreadable state is logged as a warning and replaced by an empty map
/// rather than failing the process.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    profiles: DashMap<String, PreferenceProfile>,
}

impl JsonFileStore {
    /// Create a store backed by `path`. The file is not read until
    /// [`ProfileStore::load_all`] is called.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            profiles: DashMap::new(),
        }
    }

    /// Create a store at the platform data directory
    /// (`<data_dir>/adaptive-coach/profiles.json`), falling back to the
    /// current directory when no data directory is available.
    #[must_use]
    pub fn with_default_path() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("adaptive-coach").join("profiles.json"))
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_atomic(&self) -> AppResult<usize> {
        let snapshot: BTreeMap<String, PreferenceProfile> = self
            .profiles
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let serialized = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &serialized).await?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::storage(format!(
                "Failed to move profile store into place at {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(
            profiles = snapshot.len(),
            path = %self.path.display(),
            "Persisted profile store"
        );
        Ok(snapshot.len())
    }
}

#[async_trait::async_trait]
impl ProfileStore for JsonFileStore {
    async fn get(&self, user_id: &str) -> PreferenceProfile {
        self.profiles
            .entry(user_id.to_owned())
            .or_insert_with(|| PreferenceProfile::new(user_id))
            .clone()
    }

    async fn save(&self, profile: PreferenceProfile) -> AppResult<()> {
        self.profiles.insert(profile.user_id.clone(), profile);
        self.write_atomic().await.map(|_| ())
    }

    async fn load_all(&self) -> AppResult<usize> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No persisted profiles yet, starting empty");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<BTreeMap<String, PreferenceProfile>>(&raw) {
            Ok(map) => {
                let count = map.len();
                self.profiles.clear();
                for (user_id, profile) in map {
                    self.profiles.insert(user_id, profile);
                }
                info!(profiles = count, path = %self.path.display(), "Loaded profile store");
                Ok(count)
            }
            Err(e) => {
                // Corrupt store: recover by starting empty. All learning for
                // this run is ephemeral until the next successful save.
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Persisted profile store is unreadable, starting with an empty store"
                );
                self.profiles.clear();
                Ok(0)
            }
        }
    }

    async fn persist_all(&self) -> AppResult<usize> {
        self.write_atomic().await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::store::ProfileStore;

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");

        {
            let store = JsonFileStore::new(&path);
            let mut profile = store.get("u1").await;
            profile.acceptance_rate = 0.9;
            profile.total_interactions = 12;
            store.save(profile).await.unwrap();
        }

        let reloaded = JsonFileStore::new(&path);
        assert_eq!(reloaded.load_all().await.unwrap(), 1);
        let profile = reloaded.get("u1").await;
        assert!((profile.acceptance_rate - 0.9).abs() < f64::EPSILON);
        assert_eq!(profile.total_interactions, 12);
    }

    #[tokio::test]
    async fn test_corrupt_store_recovers_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        tokio::fs::write(&path, b"{ not json at all").await.unwrap();

        let store = JsonFileStore::new(&path);
        assert_eq!(store.load_all().await.unwrap(), 0);

        // The store stays usable and can persist again.
        let profile = store.get("u1").await;
        store.save(profile).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope.json"));
        assert_eq!(store.load_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persist_all_writes_every_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let store = JsonFileStore::new(&path);
        let _ = store.get("a").await;
        let _ = store.get("b").await;
        assert_eq!(store.persist_all().await.unwrap(), 2);
        assert!(path.exists());
    }
}
