// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository abstractions defined in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # In-Memory Store
//!
//! [`InMemoryReminderStore`] keeps every table behind one `parking_lot::RwLock`
//! and implements all repository traits. Because each trait method takes the
//! write lock exactly once, the guarded operations are atomic:
//!
//! - `transition` compares and sets the occurrence status in one critical section
//! - `insert_if_clear` checks the pending and conflict rules and inserts in one critical section
//! - `commit_feedback` writes interaction, occurrence, template and observation together
//!
//! Clones share the same tables, so one store can be handed to every service
//! behind its individual trait object.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::behavior::{BehaviorObservation, ContextSample};
use crate::domain::interaction::{apply_feedback, FeedbackOutcome, InteractionId, InteractionRecord};
use crate::domain::model::{select_active, ModelId, ModelType, PredictionModel};
use crate::domain::occurrence::{OccurrenceId, OccurrenceStatus, ReminderOccurrence};
use crate::domain::reminder::{ReminderId, ReminderTemplate, UserId};
use crate::domain::repository::{
    BehaviorRepository, FeedbackUnitOfWork, InsertOutcome, InteractionRepository, ModelRepository,
    OccurrenceRepository, ReminderRepository, RepositoryError, TemplateMutation, TransitionOutcome,
};

#[derive(Default)]
struct Tables {
    templates: HashMap<ReminderId, ReminderTemplate>,
    occurrences: HashMap<OccurrenceId, ReminderOccurrence>,
    interactions: HashMap<InteractionId, InteractionRecord>,
    models: HashMap<ModelId, PredictionModel>,
    observations: Vec<BehaviorObservation>,
    context: Vec<ContextSample>,
}

#[derive(Clone, Default)]
pub struct InMemoryReminderStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occurrences in the given status (diagnostics and tests).
    pub fn count_by_status(&self, status: OccurrenceStatus) -> usize {
        self.tables
            .read()
            .occurrences
            .values()
            .filter(|o| o.status == status)
            .count()
    }
}

fn sorted_occurrences<'a, I>(iter: I) -> Vec<ReminderOccurrence>
where
    I: Iterator<Item = &'a ReminderOccurrence>,
{
    let mut occurrences: Vec<ReminderOccurrence> = iter.cloned().collect();
    occurrences.sort_by(|a, b| a.scheduled_time.cmp(&b.scheduled_time).then(a.id.0.cmp(&b.id.0)));
    occurrences
}

#[async_trait]
impl ReminderRepository for InMemoryReminderStore {
    async fn save(&self, template: &ReminderTemplate) -> Result<(), RepositoryError> {
        self.tables.write().templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ReminderId) -> Result<Option<ReminderTemplate>, RepositoryError> {
        Ok(self.tables.read().templates.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<ReminderTemplate>, RepositoryError> {
        let tables = self.tables.read();
        let mut templates: Vec<ReminderTemplate> = tables
            .templates
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
        Ok(templates)
    }

    async fn users_with_active_templates(&self) -> Result<Vec<UserId>, RepositoryError> {
        let tables = self.tables.read();
        let mut users: Vec<UserId> = tables
            .templates
            .values()
            .filter(|t| t.is_active)
            .map(|t| t.user_id)
            .collect();
        users.sort();
        users.dedup();
        Ok(users)
    }

    async fn update_with(
        &self,
        id: ReminderId,
        mutation: TemplateMutation<'_>,
    ) -> Result<ReminderTemplate, RepositoryError> {
        let mut tables = self.tables.write();
        let stored = tables
            .templates
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("reminder template", id))?;
        let mut candidate = stored.clone();
        mutation(&mut candidate)?;
        *stored = candidate.clone();
        Ok(candidate)
    }
}

#[async_trait]
impl OccurrenceRepository for InMemoryReminderStore {
    async fn insert_if_clear(
        &self,
        occurrence: &ReminderOccurrence,
        buffer: Duration,
    ) -> Result<InsertOutcome, RepositoryError> {
        let mut tables = self.tables.write();
        let lower = occurrence.scheduled_time - buffer;
        let upper = occurrence.scheduled_time + buffer;

        let pending = tables
            .occurrences
            .values()
            .find(|o| o.template_id == occurrence.template_id && o.status == OccurrenceStatus::Scheduled);
        if let Some(existing) = pending {
            return Ok(InsertOutcome::Pending { existing: existing.id });
        }

        let conflict = tables.occurrences.values().find(|o| {
            o.user_id == occurrence.user_id
                && o.status == OccurrenceStatus::Scheduled
                && o.scheduled_time >= lower
                && o.scheduled_time <= upper
        });

        if let Some(existing) = conflict {
            return Ok(InsertOutcome::Conflict {
                existing: existing.id,
                existing_time: existing.scheduled_time,
            });
        }

        tables.occurrences.insert(occurrence.id, occurrence.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_id(&self, id: OccurrenceId) -> Result<Option<ReminderOccurrence>, RepositoryError> {
        Ok(self.tables.read().occurrences.get(&id).cloned())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ReminderOccurrence>, RepositoryError> {
        let tables = self.tables.read();
        Ok(sorted_occurrences(tables.occurrences.values().filter(|o| o.is_due(now))))
    }

    async fn find_sent_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ReminderOccurrence>, RepositoryError> {
        let tables = self.tables.read();
        Ok(sorted_occurrences(tables.occurrences.values().filter(|o| {
            o.status == OccurrenceStatus::Sent && o.sent_at.is_some_and(|sent| sent <= cutoff)
        })))
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<ReminderOccurrence>, RepositoryError> {
        let tables = self.tables.read();
        Ok(sorted_occurrences(tables.occurrences.values().filter(|o| o.user_id == user_id)))
    }

    async fn find_by_template(&self, template_id: ReminderId) -> Result<Vec<ReminderOccurrence>, RepositoryError> {
        let tables = self.tables.read();
        Ok(sorted_occurrences(tables.occurrences.values().filter(|o| o.template_id == template_id)))
    }

    async fn transition(
        &self,
        id: OccurrenceId,
        expected: OccurrenceStatus,
        next: OccurrenceStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, RepositoryError> {
        let mut tables = self.tables.write();
        let occurrence = tables
            .occurrences
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("occurrence", id))?;

        if occurrence.status != expected {
            return Ok(TransitionOutcome::Stale { current: occurrence.status });
        }
        occurrence.transition(next, at)?;
        Ok(TransitionOutcome::Applied(occurrence.clone()))
    }
}

#[async_trait]
impl InteractionRepository for InMemoryReminderStore {
    async fn find_by_occurrence(&self, occurrence_id: OccurrenceId) -> Result<Vec<InteractionRecord>, RepositoryError> {
        let tables = self.tables.read();
        let mut records: Vec<InteractionRecord> = tables
            .interactions
            .values()
            .filter(|r| r.occurrence_id == occurrence_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        Ok(records)
    }
}

#[async_trait]
impl FeedbackUnitOfWork for InMemoryReminderStore {
    async fn commit_feedback(&self, record: InteractionRecord) -> Result<FeedbackOutcome, RepositoryError> {
        let mut tables = self.tables.write();

        let mut occurrence = tables
            .occurrences
            .get(&record.occurrence_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("occurrence", record.occurrence_id))?;
        let mut template = tables
            .templates
            .get(&occurrence.template_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("reminder template", occurrence.template_id))?;

        // Work on copies; nothing is written unless every rule succeeds.
        let observation = apply_feedback(&mut occurrence, &mut template, &record)?;

        tables.occurrences.insert(occurrence.id, occurrence.clone());
        tables.templates.insert(template.id, template.clone());
        tables.interactions.insert(record.id, record.clone());
        tables.observations.push(observation.clone());

        Ok(FeedbackOutcome {
            record,
            occurrence,
            template,
            observation,
        })
    }
}

#[async_trait]
impl ModelRepository for InMemoryReminderStore {
    async fn insert_next_version(
        &self,
        model_type: ModelType,
        parameters: serde_json::Value,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Result<PredictionModel, RepositoryError> {
        let mut tables = self.tables.write();
        let version = tables
            .models
            .values()
            .filter(|m| m.model_type == model_type)
            .map(|m| m.version)
            .max()
            .unwrap_or(0)
            + 1;
        let model = PredictionModel::new(model_type, version, parameters, is_active, created_at);
        tables.models.insert(model.id, model.clone());
        Ok(model)
    }

    async fn find_by_id(&self, id: ModelId) -> Result<Option<PredictionModel>, RepositoryError> {
        Ok(self.tables.read().models.get(&id).cloned())
    }

    async fn find_active(&self, model_type: ModelType) -> Result<Option<PredictionModel>, RepositoryError> {
        let tables = self.tables.read();
        Ok(select_active(tables.models.values(), model_type).cloned())
    }

    async fn list_by_type(&self, model_type: ModelType) -> Result<Vec<PredictionModel>, RepositoryError> {
        let tables = self.tables.read();
        let mut models: Vec<PredictionModel> = tables
            .models
            .values()
            .filter(|m| m.model_type == model_type)
            .cloned()
            .collect();
        models.sort_by_key(|m| m.version);
        Ok(models)
    }

    async fn set_active(&self, id: ModelId, is_active: bool) -> Result<PredictionModel, RepositoryError> {
        let mut tables = self.tables.write();
        let model = tables
            .models
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("prediction model", id))?;
        model.is_active = is_active;
        Ok(model.clone())
    }
}

#[async_trait]
impl BehaviorRepository for InMemoryReminderStore {
    async fn append_observation(&self, observation: BehaviorObservation) -> Result<(), RepositoryError> {
        self.tables.write().observations.push(observation);
        Ok(())
    }

    async fn append_context(&self, sample: ContextSample) -> Result<(), RepositoryError> {
        self.tables.write().context.push(sample);
        Ok(())
    }

    async fn recent_observations(&self, user_id: UserId, limit: usize) -> Result<Vec<BehaviorObservation>, RepositoryError> {
        let tables = self.tables.read();
        // Reverse insertion order first so equal timestamps keep newest-first.
        let mut observations: Vec<BehaviorObservation> = tables
            .observations
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        observations.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        observations.truncate(limit);
        Ok(observations)
    }

    async fn recent_context(&self, user_id: UserId, limit: usize) -> Result<Vec<ContextSample>, RepositoryError> {
        let tables = self.tables.read();
        let mut samples: Vec<ContextSample> = tables
            .context
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        samples.sort_by(|a, b| b.sampled_at.cmp(&a.sampled_at));
        samples.truncate(limit);
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reminder::{Channel, NewReminder};
    use serde_json::json;

    fn template(user_id: UserId, now: DateTime<Utc>) -> ReminderTemplate {
        ReminderTemplate::new(
            NewReminder {
                user_id,
                label: "Hydrate".to_string(),
                start_time: None,
                end_time: None,
                priority: 5,
                preferred_channel: None,
            },
            now,
        )
        .unwrap()
    }

    fn occurrence(tpl: &ReminderTemplate, at: DateTime<Utc>) -> ReminderOccurrence {
        ReminderOccurrence::scheduled(tpl.id, tpl.user_id, at, Channel::Push, None, at)
    }

    #[tokio::test]
    async fn test_insert_if_clear_detects_window_inclusive() {
        let store = InMemoryReminderStore::new();
        let now = Utc::now();
        let user = UserId::new();
        let buffer = Duration::minutes(15);

        let first = occurrence(&template(user, now), now);
        assert_eq!(store.insert_if_clear(&first, buffer).await.unwrap(), InsertOutcome::Inserted);

        let edge = occurrence(&template(user, now), now + buffer);
        assert!(matches!(
            store.insert_if_clear(&edge, buffer).await.unwrap(),
            InsertOutcome::Conflict { existing, .. } if existing == first.id
        ));

        let clear = occurrence(&template(user, now), now + buffer + Duration::seconds(1));
        assert_eq!(store.insert_if_clear(&clear, buffer).await.unwrap(), InsertOutcome::Inserted);
    }

    #[tokio::test]
    async fn test_template_with_pending_occurrence_is_refused() {
        let store = InMemoryReminderStore::new();
        let now = Utc::now();
        let tpl = template(UserId::new(), now);
        let buffer = Duration::minutes(15);

        let first = occurrence(&tpl, now);
        store.insert_if_clear(&first, buffer).await.unwrap();
        assert_eq!(
            store.insert_if_clear(&occurrence(&tpl, now + Duration::hours(3)), buffer).await.unwrap(),
            InsertOutcome::Pending { existing: first.id }
        );

        store
            .transition(first.id, OccurrenceStatus::Scheduled, OccurrenceStatus::Sent, now)
            .await
            .unwrap();
        assert_eq!(
            store.insert_if_clear(&occurrence(&tpl, now + Duration::hours(3)), buffer).await.unwrap(),
            InsertOutcome::Inserted
        );
    }

    #[tokio::test]
    async fn test_conflicts_ignore_other_users_and_non_scheduled() {
        let store = InMemoryReminderStore::new();
        let now = Utc::now();
        let buffer = Duration::minutes(15);
        let a = template(UserId::new(), now);
        let b = template(UserId::new(), now);

        let sent = occurrence(&a, now);
        store.insert_if_clear(&sent, buffer).await.unwrap();
        store
            .transition(sent.id, OccurrenceStatus::Scheduled, OccurrenceStatus::Sent, now)
            .await
            .unwrap();

        assert_eq!(store.insert_if_clear(&occurrence(&a, now), buffer).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert_if_clear(&occurrence(&b, now), buffer).await.unwrap(), InsertOutcome::Inserted);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = InMemoryReminderStore::new();
        let now = Utc::now();
        let tpl = template(UserId::new(), now);
        let occ = occurrence(&tpl, now);
        store.insert_if_clear(&occ, Duration::minutes(15)).await.unwrap();

        let first = store
            .transition(occ.id, OccurrenceStatus::Scheduled, OccurrenceStatus::Sent, now)
            .await
            .unwrap();
        assert!(matches!(first, TransitionOutcome::Applied(ref o) if o.status == OccurrenceStatus::Sent));

        let second = store
            .transition(occ.id, OccurrenceStatus::Scheduled, OccurrenceStatus::Sent, now)
            .await
            .unwrap();
        assert_eq!(second, TransitionOutcome::Stale { current: OccurrenceStatus::Sent });
    }

    #[tokio::test]
    async fn test_transition_unknown_id_is_not_found() {
        let store = InMemoryReminderStore::new();
        let err = store
            .transition(OccurrenceId::new(), OccurrenceStatus::Scheduled, OccurrenceStatus::Sent, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { entity: "occurrence", .. }));
    }

    #[tokio::test]
    async fn test_commit_feedback_is_all_or_nothing() {
        let store = InMemoryReminderStore::new();
        let now = Utc::now();
        let tpl = template(UserId::new(), now);
        ReminderRepository::save(&store, &tpl).await.unwrap();
        let occ = occurrence(&tpl, now);
        store.insert_if_clear(&occ, Duration::minutes(15)).await.unwrap();

        // Still SCHEDULED: the feedback must be rejected and nothing written.
        let record = InteractionRecord::new(occ.id, crate::domain::InteractionKind::Completed, json!({}), now);
        assert!(matches!(
            store.commit_feedback(record).await.unwrap_err(),
            RepositoryError::Transition(_)
        ));
        assert!(store.find_by_occurrence(occ.id).await.unwrap().is_empty());
        assert_eq!(ReminderRepository::find_by_id(&store, tpl.id).await.unwrap().unwrap().priority.get(), 5);
        assert!(store.recent_observations(tpl.user_id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_versions_increment_per_type() {
        let store = InMemoryReminderStore::new();
        let now = Utc::now();
        let a = store.insert_next_version(ModelType::Scheduling, json!({}), true, now).await.unwrap();
        let b = store.insert_next_version(ModelType::Scheduling, json!({}), false, now).await.unwrap();
        let c = store.insert_next_version(ModelType::ChannelSelection, json!({}), true, now).await.unwrap();
        assert_eq!((a.version, b.version, c.version), (1, 2, 1));
        assert_eq!(store.find_active(ModelType::Scheduling).await.unwrap().unwrap().id, a.id);

        store.set_active(b.id, true).await.unwrap();
        assert_eq!(store.find_active(ModelType::Scheduling).await.unwrap().unwrap().id, b.id);
    }

    #[tokio::test]
    async fn test_recent_observations_newest_first_and_bounded() {
        let store = InMemoryReminderStore::new();
        let user = UserId::new();
        let now = Utc::now();
        for minutes in [5, 1, 9, 3] {
            store
                .append_observation(BehaviorObservation::new(user, now + Duration::minutes(minutes), json!({ "m": minutes })))
                .await
                .unwrap();
        }
        store
            .append_observation(BehaviorObservation::new(UserId::new(), now, json!({})))
            .await
            .unwrap();

        let recent = store.recent_observations(user, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].features["m"], 9);
        assert_eq!(recent[1].features["m"], 5);
    }
}
