// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Scheduler
//!
//! Produces at most one new `Scheduled` occurrence per active template of a
//! user per pass. For each template:
//!
//! 1. Skip it when it still has an undelivered `Scheduled` occurrence.
//! 2. Predict a delivery time with the strategy resolved from the model
//!    registry (model-backed when a `Scheduling` model is active, heuristic
//!    otherwise). Model calls are bounded by `prediction_timeout`.
//! 3. Insert the occurrence unless another `Scheduled` occurrence of the same
//!    user lies within `±conflict_buffer`. Check and insert are one atomic
//!    store operation, so concurrent passes cannot both win.
//!
//! A failing template (prediction error, timeout, storage error) is logged,
//! counted and skipped; its siblings are still processed.

use chrono::Duration;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::behavior_store::BehaviorStore;
use crate::application::error::EngineError;
use crate::application::model_registry::ModelRegistry;
use crate::domain::clock::Clock;
use crate::domain::config::{to_chrono, EngineConfig};
use crate::domain::events::{ReminderEvent, SkipReason};
use crate::domain::occurrence::{OccurrenceId, OccurrenceStatus, ReminderOccurrence};
use crate::domain::prediction::{HeuristicStrategy, PredictionError, PredictionInput, PredictionStrategy};
use crate::domain::reminder::{Channel, ReminderTemplate, UserId};
use crate::domain::repository::{InsertOutcome, OccurrenceRepository, ReminderRepository};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulingReport {
    pub scheduled: Vec<OccurrenceId>,
    /// Templates that still had an undelivered occurrence.
    pub skipped_pending: usize,
    pub skipped_conflicts: usize,
    pub failed: usize,
}

impl SchedulingReport {
    fn skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::Pending { .. } => self.skipped_pending += 1,
            SkipReason::Conflict { .. } => self.skipped_conflicts += 1,
            SkipReason::PredictionFailed { .. } | SkipReason::StorageFailed { .. } => self.failed += 1,
        }
    }
}

pub struct Scheduler {
    reminders: Arc<dyn ReminderRepository>,
    occurrences: Arc<dyn OccurrenceRepository>,
    registry: Arc<ModelRegistry>,
    behavior: Arc<BehaviorStore>,
    heuristic: Arc<dyn PredictionStrategy>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    conflict_buffer: Duration,
    prediction_timeout: std::time::Duration,
    default_channel: Channel,
    recent_limit: usize,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reminders: Arc<dyn ReminderRepository>,
        occurrences: Arc<dyn OccurrenceRepository>,
        registry: Arc<ModelRegistry>,
        behavior: Arc<BehaviorStore>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        config: &EngineConfig,
    ) -> Self {
        let heuristic = HeuristicStrategy::new(
            to_chrono(config.scheduling.fallback_min_offset),
            to_chrono(config.scheduling.fallback_max_offset),
        );
        Self {
            reminders,
            occurrences,
            registry,
            behavior,
            heuristic: Arc::new(heuristic),
            clock,
            event_bus,
            conflict_buffer: to_chrono(config.scheduling.conflict_buffer),
            prediction_timeout: config.scheduling.prediction_timeout,
            default_channel: config.scheduling.default_channel,
            recent_limit: config.behavior.recent_limit,
        }
    }

    /// One scheduling pass over the user's active templates, in creation order.
    pub async fn schedule_for_user(&self, user_id: UserId) -> Result<SchedulingReport, EngineError> {
        let templates: Vec<ReminderTemplate> = self
            .reminders
            .find_by_user(user_id)
            .await?
            .into_iter()
            .filter(|t| t.is_active)
            .collect();

        let mut report = SchedulingReport::default();
        if templates.is_empty() {
            debug!(user_id = %user_id, "No active templates to schedule");
            return Ok(report);
        }

        let strategy = self.registry.scheduling_strategy(self.heuristic.clone()).await?;
        let recent_behavior = self.behavior.recent_observations(user_id, self.recent_limit).await?;
        let recent_context = self.behavior.recent_context(user_id, self.recent_limit).await?;

        for template in templates {
            let input = PredictionInput {
                template,
                recent_behavior: recent_behavior.clone(),
                recent_context: recent_context.clone(),
                now: self.clock.now(),
            };

            match self.schedule_template(strategy.as_ref(), &input).await {
                Ok(id) => report.scheduled.push(id),
                Err(reason) => {
                    report.skip(&reason);
                    self.event_bus.publish(ReminderEvent::SchedulingSkipped {
                        reminder_id: input.template.id,
                        user_id,
                        skip: reason,
                        skipped_at: input.now,
                    });
                }
            }
        }

        info!(
            user_id = %user_id,
            strategy = strategy.name(),
            scheduled = report.scheduled.len(),
            skipped_pending = report.skipped_pending,
            skipped_conflicts = report.skipped_conflicts,
            failed = report.failed,
            "Scheduling pass finished"
        );
        Ok(report)
    }

    async fn schedule_template(
        &self,
        strategy: &dyn PredictionStrategy,
        input: &PredictionInput,
    ) -> Result<OccurrenceId, SkipReason> {
        let template = &input.template;

        let pending = self.occurrences.find_by_template(template.id).await.map_err(|e| {
            warn!(reminder_id = %template.id, error = %e, "Failed to read occurrences, skipping template");
            metrics::counter!("nudge_scheduling_failures_total", "cause" => "storage").increment(1);
            SkipReason::StorageFailed { error: e.to_string() }
        })?;
        if let Some(existing) = pending.iter().find(|o| o.status == OccurrenceStatus::Scheduled) {
            debug!(reminder_id = %template.id, existing_occurrence = %existing.id, "Template already has a pending occurrence");
            return Err(SkipReason::Pending { existing: existing.id });
        }

        let prediction = match tokio::time::timeout(self.prediction_timeout, strategy.predict(input)).await {
            Ok(result) => result,
            Err(_) => Err(PredictionError::Timeout(self.prediction_timeout)),
        };
        let prediction = prediction.map_err(|e| {
            warn!(reminder_id = %template.id, strategy = strategy.name(), error = %e, "Prediction failed, skipping template");
            metrics::counter!("nudge_scheduling_failures_total", "cause" => "prediction").increment(1);
            SkipReason::PredictionFailed { error: e.to_string() }
        })?;

        let channel = prediction
            .channel
            .or(template.preferred_channel)
            .unwrap_or(self.default_channel);
        let occurrence = ReminderOccurrence::scheduled(
            template.id,
            template.user_id,
            prediction.delivery_time,
            channel,
            prediction.confidence,
            input.now,
        );

        match self.occurrences.insert_if_clear(&occurrence, self.conflict_buffer).await {
            Ok(InsertOutcome::Inserted) => {
                debug!(
                    occurrence_id = %occurrence.id,
                    reminder_id = %template.id,
                    scheduled_time = %occurrence.scheduled_time,
                    channel = %channel,
                    "Occurrence scheduled"
                );
                metrics::counter!("nudge_occurrences_scheduled_total", "strategy" => strategy.name()).increment(1);
                self.event_bus.publish(ReminderEvent::OccurrenceScheduled {
                    occurrence_id: occurrence.id,
                    reminder_id: template.id,
                    user_id: template.user_id,
                    scheduled_time: occurrence.scheduled_time,
                    channel,
                    strategy: strategy.name().to_string(),
                });
                Ok(occurrence.id)
            }
            Ok(InsertOutcome::Pending { existing }) => {
                debug!(reminder_id = %template.id, existing_occurrence = %existing, "Template already has a pending occurrence");
                Err(SkipReason::Pending { existing })
            }
            Ok(InsertOutcome::Conflict { existing, existing_time }) => {
                debug!(
                    reminder_id = %template.id,
                    candidate = %occurrence.scheduled_time,
                    existing_occurrence = %existing,
                    existing_time = %existing_time,
                    "Candidate conflicts with a scheduled occurrence, skipping template"
                );
                metrics::counter!("nudge_scheduling_conflicts_total").increment(1);
                Err(SkipReason::Conflict { existing })
            }
            Err(e) => {
                warn!(reminder_id = %template.id, error = %e, "Failed to store occurrence, skipping template");
                metrics::counter!("nudge_scheduling_failures_total", "cause" => "storage").increment(1);
                Err(SkipReason::StorageFailed { error: e.to_string() })
            }
        }
    }

    /// Accept a pass for background processing and return immediately.
    pub fn spawn_schedule_for_user(self: &Arc<Self>, user_id: UserId) -> JoinHandle<Result<SchedulingReport, EngineError>> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let result = scheduler.schedule_for_user(user_id).await;
            if let Err(e) = &result {
                warn!(user_id = %user_id, error = %e, "Background scheduling pass failed");
            }
            result
        })
    }

    /// Independent users are scheduled concurrently; one user's templates stay sequential.
    pub async fn schedule_for_users(&self, users: &[UserId]) -> Vec<(UserId, Result<SchedulingReport, EngineError>)> {
        let passes = users.iter().map(|&user_id| async move { (user_id, self.schedule_for_user(user_id).await) });
        join_all(passes).await
    }

    /// Pass over every user that owns an active template.
    pub async fn schedule_all(&self) -> Result<Vec<(UserId, Result<SchedulingReport, EngineError>)>, EngineError> {
        let users = self.reminders.users_with_active_templates().await?;
        Ok(self.schedule_for_users(&users).await)
    }
}
