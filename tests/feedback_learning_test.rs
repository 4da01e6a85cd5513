// ABOUTME: Tests for feedback-driven profile learning across the engine boundary
// ABOUTME: EMA convergence, per-user write serialization, and store persistence
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::sync::Arc;

use adaptive_coach::engine::WorkoutEngine;
use adaptive_coach::models::{Feedback, FeedbackAction};
use adaptive_coach::store::{InMemoryProfileStore, JsonFileStore, ProfileStore};
use uuid::Uuid;

fn feedback(action: FeedbackAction) -> Feedback {
    Feedback {
        action,
        rating: None,
        response_seconds: None,
        reason: None,
        modified_value: None,
    }
}

#[tokio::test]
async fn test_twenty_accepts_raise_acceptance_toward_one() {
    let store = Arc::new(InMemoryProfileStore::new());
    let engine = WorkoutEngine::new(store.clone(), None);
    let initial = store.get("u1").await.acceptance_rate;

    for _ in 0..20 {
        engine
            .feedback("u1", Uuid::new_v4(), feedback(FeedbackAction::Accepted))
            .await;
    }

    let profile = store.get("u1").await;
    assert!(profile.acceptance_rate > initial);
    assert!(profile.acceptance_rate > 0.85);
    assert!(profile.acceptance_rate <= 1.0);
    assert_eq!(profile.total_interactions, 20);
}

#[tokio::test]
async fn test_rejections_with_reasons_accumulate_in_ring() {
    let store = Arc::new(InMemoryProfileStore::new());
    let engine = WorkoutEngine::new(store.clone(), None);

    for i in 0..25 {
        let mut rejected = feedback(FeedbackAction::Rejected);
        rejected.reason = Some(format!("too aggressive #{i}"));
        engine.feedback("u1", Uuid::new_v4(), rejected).await;
    }

    let profile = store.get("u1").await;
    assert!(profile.acceptance_rate < 0.5);
    // Ring capacity 20: the first five reasons were evicted.
    assert_eq!(profile.recent_rejection_reasons.len(), 20);
    assert_eq!(
        profile.recent_rejection_reasons.front().unwrap(),
        "too aggressive #5"
    );
}

#[tokio::test]
async fn test_concurrent_feedback_for_same_user_loses_no_updates() {
    let store = Arc::new(InMemoryProfileStore::new());
    let engine = Arc::new(WorkoutEngine::new(store.clone(), None));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .feedback("shared", Uuid::new_v4(), feedback(FeedbackAction::Accepted))
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Per-user serialization: every read-modify-write landed.
    let profile = store.get("shared").await;
    assert_eq!(profile.total_interactions, 20);
}

#[tokio::test]
async fn test_concurrent_feedback_for_different_users_is_independent() {
    let store = Arc::new(InMemoryProfileStore::new());
    let engine = Arc::new(WorkoutEngine::new(store.clone(), None));

    let mut handles = Vec::new();
    for user in ["a", "b", "c", "d"] {
        for _ in 0..5 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .feedback(user, Uuid::new_v4(), feedback(FeedbackAction::Accepted))
                    .await;
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for user in ["a", "b", "c", "d"] {
        assert_eq!(store.get(user).await.total_interactions, 5);
    }
}

#[tokio::test]
async fn test_insights_reflect_recent_feedback() {
    let engine = WorkoutEngine::new(Arc::new(InMemoryProfileStore::new()), None);

    for _ in 0..10 {
        engine
            .feedback("u1", Uuid::new_v4(), feedback(FeedbackAction::Accepted))
            .await;
    }

    let summary = engine.insights("u1").await;
    assert!((summary.recent_acceptance_rate - 1.0).abs() < f64::EPSILON);
    assert!((summary.personalization_level - 0.2).abs() < f64::EPSILON);
    assert!(summary
        .coaching_notes
        .iter()
        .any(|n| n.contains("Limited interaction history")));
}

#[tokio::test]
async fn test_insights_never_mutate_state() {
    let store = Arc::new(InMemoryProfileStore::new());
    let engine = WorkoutEngine::new(store.clone(), None);

    engine
        .feedback("u1", Uuid::new_v4(), feedback(FeedbackAction::Accepted))
        .await;
    let before = store.get("u1").await;
    let _ = engine.insights("u1").await;
    let _ = engine.insights("u1").await;
    let after = store.get("u1").await;

    assert_eq!(before.total_interactions, after.total_interactions);
    assert!((before.acceptance_rate - after.acceptance_rate).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_learning_survives_process_restart_via_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.json");

    {
        let store = Arc::new(JsonFileStore::new(&path));
        let engine = WorkoutEngine::new(store.clone(), None);
        for _ in 0..5 {
            engine
                .feedback("u1", Uuid::new_v4(), feedback(FeedbackAction::Accepted))
                .await;
        }
        store.persist_all().await.unwrap();
    }

    // A fresh store (new process) sees the learned state.
    let store = Arc::new(JsonFileStore::new(&path));
    store.load_all().await.unwrap();
    let profile = store.get("u1").await;
    assert_eq!(profile.total_interactions, 5);
    assert!(profile.acceptance_rate > 0.5);
}

#[tokio::test]
async fn test_corrupt_store_degrades_to_defaults_not_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.json");
    tokio::fs::write(&path, b"\x00\x01 definitely not json")
        .await
        .unwrap();

    let store = Arc::new(JsonFileStore::new(&path));
    assert_eq!(store.load_all().await.unwrap(), 0);

    // The engine keeps working on top of the recovered (empty) store.
    let engine = WorkoutEngine::new(store.clone(), None);
    engine
        .feedback("u1", Uuid::new_v4(), feedback(FeedbackAction::Accepted))
        .await;
    assert_eq!(store.get("u1").await.total_interactions, 1);
}
