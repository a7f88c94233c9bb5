// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

// End-to-end reminder lifecycle: schedule, dispatch, respond.

mod common;

use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use common::{harness, harness_with, reminder, RecordingChannel};
use nudge_core::application::EngineError;
use nudge_core::domain::clock::Clock;
use nudge_core::domain::config::EngineConfig;
use nudge_core::domain::events::{ReminderEvent, SkipReason};
use nudge_core::domain::repository::{OccurrenceRepository, ReminderRepository};
use nudge_core::{InteractionKind, ModelType, OccurrenceStatus, ReminderOccurrence, UserId};

async fn scheduled_for(store: &impl OccurrenceRepository, user_id: UserId) -> Vec<ReminderOccurrence> {
    store
        .find_by_user(user_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|o| o.status == OccurrenceStatus::Scheduled)
        .collect()
}

#[tokio::test]
async fn test_full_lifecycle_raises_priority() {
    let h = harness();
    let engine = &h.engine;
    let user = UserId::new();
    let now = h.clock.now();

    let template = engine
        .catalog
        .create(reminder(user, "Drink water", 5, Some(now + Duration::hours(1))))
        .await
        .unwrap();

    let report = engine.scheduler.schedule_for_user(user).await.unwrap();
    assert_eq!(report.scheduled.len(), 1);

    let pending = scheduled_for(&engine.store, user).await;
    assert_eq!(pending.len(), 1);
    let occurrence = &pending[0];
    assert!(occurrence.scheduled_time >= now);
    assert!(occurrence.scheduled_time <= now + Duration::hours(1));

    h.clock.advance(Duration::hours(1) + Duration::seconds(1));
    assert_eq!(engine.dispatcher.trigger_pending_reminders().await.unwrap(), 1);
    let sent = OccurrenceRepository::find_by_id(&engine.store, occurrence.id).await.unwrap().unwrap();
    assert_eq!(sent.status, OccurrenceStatus::Sent);
    assert_eq!(h.channel.delivered.lock().as_slice(), &[occurrence.id]);

    let outcome = engine
        .recorder
        .record_interaction(occurrence.id, InteractionKind::Completed, json!({}))
        .await
        .unwrap();
    assert_eq!(outcome.status, OccurrenceStatus::Completed);
    assert_eq!(outcome.priority.get(), 6);
    assert_eq!(engine.catalog.get(template.id).await.unwrap().priority.get(), 6);

    let behavior = engine.behavior.recent_observations(user, 10).await.unwrap();
    assert_eq!(behavior.len(), 1);
    assert_eq!(behavior[0].features["event"], "reminder_interaction");
}

#[tokio::test]
async fn test_priority_clamped_at_ten() {
    let h = harness();
    let engine = &h.engine;
    let user = UserId::new();
    let template = engine.catalog.create(reminder(user, "Stretch", 10, None)).await.unwrap();

    engine.scheduler.schedule_for_user(user).await.unwrap();
    h.clock.advance(Duration::hours(6));
    assert_eq!(engine.dispatcher.trigger_pending_reminders().await.unwrap(), 1);

    let occurrence = engine.store.find_by_template(template.id).await.unwrap().remove(0);
    let outcome = engine
        .recorder
        .record_interaction_str(occurrence.id, "COMPLETED", json!({}))
        .await
        .unwrap();
    assert_eq!(outcome.priority.get(), 10);
}

#[tokio::test]
async fn test_double_pass_within_buffer_yields_one_occurrence() {
    let h = harness();
    let engine = &h.engine;
    let user = UserId::new();
    let template = engine.catalog.create(reminder(user, "Walk", 5, None)).await.unwrap();

    engine.scheduler.schedule_for_user(user).await.unwrap();
    h.clock.advance(Duration::minutes(5));
    engine.scheduler.schedule_for_user(user).await.unwrap();

    let occurrences = engine.store.find_by_template(template.id).await.unwrap();
    assert_eq!(occurrences.len(), 1);
    assert_eq!(occurrences[0].status, OccurrenceStatus::Scheduled);
}

#[tokio::test]
async fn test_scheduled_occurrences_stay_apart_across_passes() {
    let h = harness();
    let engine = &h.engine;
    let user = UserId::new();
    for label in ["Water", "Tea", "Walk", "Stretch", "Breathe"] {
        engine.catalog.create(reminder(user, label, 5, None)).await.unwrap();
    }
    let buffer = Duration::minutes(15);

    for _ in 0..24 {
        engine.scheduler.schedule_for_user(user).await.unwrap();

        let pending = scheduled_for(&engine.store, user).await;
        for (i, a) in pending.iter().enumerate() {
            for b in &pending[i + 1..] {
                let gap = a.scheduled_time.max(b.scheduled_time) - a.scheduled_time.min(b.scheduled_time);
                assert!(gap > buffer, "occurrences {} and {} only {:?} apart", a.id, b.id, gap);
            }
        }

        h.clock.advance(Duration::minutes(40));
        engine.dispatcher.trigger_pending_reminders().await.unwrap();
    }
}

#[tokio::test]
async fn test_priority_moves_with_feedback_and_stays_bounded() {
    let h = harness();
    let engine = &h.engine;
    let user = UserId::new();
    let template = engine.catalog.create(reminder(user, "Hydrate", 5, None)).await.unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..40 {
        engine.scheduler.schedule_for_user(user).await.unwrap();
        h.clock.advance(Duration::hours(6));
        engine.dispatcher.trigger_pending_reminders().await.unwrap();

        let sent = engine
            .store
            .find_by_template(template.id)
            .await
            .unwrap()
            .into_iter()
            .find(|o| o.status == OccurrenceStatus::Sent)
            .unwrap();
        let kind = match rng.random_range(0..3) {
            0 => InteractionKind::Completed,
            1 => InteractionKind::Dismissed,
            _ => InteractionKind::Snoozed,
        };

        let before = engine.catalog.get(template.id).await.unwrap().priority;
        let after = engine
            .recorder
            .record_interaction(sent.id, kind, json!({}))
            .await
            .unwrap()
            .priority;

        if kind == InteractionKind::Completed {
            assert!(after >= before);
        } else {
            assert!(after <= before);
        }
        assert!((1..=10).contains(&after.get()));
    }
}

#[tokio::test]
async fn test_failing_template_does_not_block_siblings() {
    let h = harness();
    let engine = &h.engine;
    let user = UserId::new();
    let mut events = engine.event_bus.subscribe();
    engine.registry.register_model(ModelType::Scheduling, json!({}), true).await.unwrap();
    let broken = engine.catalog.create(reminder(user, "broken reminder", 5, None)).await.unwrap();
    let healthy = engine.catalog.create(reminder(user, "Walk", 5, None)).await.unwrap();

    let report = engine.scheduler.schedule_for_user(user).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.scheduled.len(), 1);
    assert!(engine.store.find_by_template(broken.id).await.unwrap().is_empty());

    let occurrence = engine.store.find_by_template(healthy.id).await.unwrap().remove(0);
    assert_eq!(occurrence.confidence, Some(0.5));

    let skipped = events.drain().into_iter().any(|e| {
        matches!(
            e,
            ReminderEvent::SchedulingSkipped { reminder_id, skip: SkipReason::PredictionFailed { .. }, .. }
                if reminder_id == broken.id
        )
    });
    assert!(skipped);
}

#[tokio::test]
async fn test_delivery_failure_still_marks_sent() {
    let h = harness_with(EngineConfig::default(), RecordingChannel { fail: true, ..Default::default() });
    let engine = &h.engine;
    let user = UserId::new();
    let template = engine.catalog.create(reminder(user, "Walk", 5, None)).await.unwrap();

    engine.scheduler.schedule_for_user(user).await.unwrap();
    h.clock.advance(Duration::hours(6));
    assert_eq!(engine.dispatcher.trigger_pending_reminders().await.unwrap(), 1);
    assert_eq!(engine.dispatcher.trigger_pending_reminders().await.unwrap(), 0);

    let occurrence = engine.store.find_by_template(template.id).await.unwrap().remove(0);
    assert_eq!(occurrence.status, OccurrenceStatus::Sent);
    assert_eq!(h.channel.delivered.lock().len(), 1);
}

#[tokio::test]
async fn test_unanswered_delivery_expires_when_enabled() {
    let mut config = EngineConfig::default();
    config.lifecycle.sent_ttl = Some(std::time::Duration::from_secs(2 * 3600));
    let h = harness_with(config, RecordingChannel::default());
    let engine = &h.engine;
    let user = UserId::new();
    let template = engine.catalog.create(reminder(user, "Walk", 5, None)).await.unwrap();

    engine.scheduler.schedule_for_user(user).await.unwrap();
    h.clock.advance(Duration::hours(6));
    engine.dispatcher.trigger_pending_reminders().await.unwrap();
    h.clock.advance(Duration::hours(2));
    assert_eq!(engine.dispatcher.expire_unanswered().await.unwrap(), 1);

    let occurrence = engine.store.find_by_template(template.id).await.unwrap().remove(0);
    assert_eq!(occurrence.status, OccurrenceStatus::Expired);

    let err = engine
        .recorder
        .record_interaction(occurrence.id, InteractionKind::Completed, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { from: OccurrenceStatus::Expired, .. }));
    assert_eq!(engine.catalog.get(template.id).await.unwrap().priority.get(), 5);
}

#[tokio::test]
async fn test_deactivated_template_is_not_scheduled() {
    let h = harness();
    let engine = &h.engine;
    let user = UserId::new();
    let template = engine.catalog.create(reminder(user, "Walk", 5, None)).await.unwrap();
    engine.catalog.deactivate(template.id).await.unwrap();

    let report = tokio_test::assert_ok!(engine.scheduler.schedule_for_user(user).await);
    assert!(report.scheduled.is_empty());
    assert!(engine.store.users_with_active_templates().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_retraining_registers_active_model() {
    let h = harness();
    let engine = &h.engine;
    let user = UserId::new();
    let template = engine.catalog.create(reminder(user, "Walk", 5, None)).await.unwrap();

    engine.scheduler.schedule_for_user(user).await.unwrap();
    h.clock.advance(Duration::hours(6));
    engine.dispatcher.trigger_pending_reminders().await.unwrap();
    let occurrence = engine.store.find_by_template(template.id).await.unwrap().remove(0);
    engine
        .recorder
        .record_interaction(occurrence.id, InteractionKind::Completed, json!({}))
        .await
        .unwrap();

    let outcome = engine.retraining.spawn(ModelType::Scheduling, vec![user], true).join().await;
    assert!(matches!(outcome, nudge_core::application::RetrainingOutcome::Registered(ref m) if m.version == 1));

    let active = engine.registry.get_active_model(ModelType::Scheduling).await.unwrap().unwrap();
    assert_eq!(active.parameters["confidence"], 1.0);
    assert_eq!(active.parameters["channel"], "push");
}
