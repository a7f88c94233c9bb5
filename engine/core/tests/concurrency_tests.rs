// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

// Overlapping sweeps, scheduling passes and interactions on a shared store.

mod common;

use chrono::Duration;
use futures::future::join_all;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use common::{harness, reminder};
use nudge_core::application::EngineError;
use nudge_core::domain::repository::OccurrenceRepository;
use nudge_core::{InteractionKind, OccurrenceStatus, UserId};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sweeps_dispatch_each_occurrence_once() {
    let h = harness();
    let engine = &h.engine;

    for i in 0..40 {
        let user = UserId::new();
        engine.catalog.create(reminder(user, &format!("Reminder {}", i), 5, None)).await.unwrap();
    }
    let results = engine.scheduler.schedule_all().await.unwrap();
    assert_eq!(results.len(), 40);

    h.clock.advance(Duration::hours(6));

    let sweeps = (0..6).map(|_| {
        let dispatcher = Arc::clone(&engine.dispatcher);
        tokio::spawn(async move { dispatcher.trigger_pending_reminders().await.unwrap() })
    });
    let total: usize = join_all(sweeps).await.into_iter().map(|r| r.unwrap()).sum();
    assert_eq!(total, 40);

    let delivered = h.channel.delivered.lock().clone();
    assert_eq!(delivered.len(), 40);
    let unique: HashSet<_> = delivered.iter().collect();
    assert_eq!(unique.len(), 40);
    assert_eq!(engine.store.count_by_status(OccurrenceStatus::Sent), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_passes_for_one_user_respect_buffer() {
    let h = harness();
    let engine = &h.engine;
    let user = UserId::new();
    for label in ["Water", "Tea", "Walk", "Stretch", "Breathe", "Posture"] {
        engine.catalog.create(reminder(user, label, 5, None)).await.unwrap();
    }

    let passes = (0..8).map(|_| engine.scheduler.spawn_schedule_for_user(user));
    for handle in join_all(passes).await {
        handle.unwrap().unwrap();
    }

    let pending: Vec<_> = engine
        .store
        .find_by_user(user)
        .await
        .unwrap()
        .into_iter()
        .filter(|o| o.status == OccurrenceStatus::Scheduled)
        .collect();

    let templates: HashSet<_> = pending.iter().map(|o| o.template_id).collect();
    assert_eq!(templates.len(), pending.len(), "a template got two pending occurrences");

    for (i, a) in pending.iter().enumerate() {
        for b in &pending[i + 1..] {
            let gap = a.scheduled_time.max(b.scheduled_time) - a.scheduled_time.min(b.scheduled_time);
            assert!(gap > Duration::minutes(15));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_interactions_apply_once() {
    let h = harness();
    let engine = &h.engine;
    let user = UserId::new();
    let template = engine.catalog.create(reminder(user, "Walk", 5, None)).await.unwrap();

    engine.scheduler.schedule_for_user(user).await.unwrap();
    h.clock.advance(Duration::hours(6));
    engine.dispatcher.trigger_pending_reminders().await.unwrap();
    let occurrence = engine.store.find_by_template(template.id).await.unwrap().remove(0);

    let attempts = (0..8).map(|_| {
        let recorder = Arc::clone(&engine.recorder);
        tokio::spawn(async move {
            recorder
                .record_interaction(occurrence.id, InteractionKind::Completed, json!({}))
                .await
        })
    });
    let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, EngineError::InvalidTransition { .. })));
    assert_eq!(engine.catalog.get(template.id).await.unwrap().priority.get(), 6);
}
