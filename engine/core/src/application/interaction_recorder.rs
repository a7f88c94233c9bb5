// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::application::error::EngineError;
use crate::domain::clock::Clock;
use crate::domain::events::ReminderEvent;
use crate::domain::interaction::{InteractionKind, InteractionRecord};
use crate::domain::occurrence::{OccurrenceId, OccurrenceStatus};
use crate::domain::reminder::Priority;
use crate::domain::repository::{FeedbackUnitOfWork, OccurrenceRepository};
use crate::infrastructure::event_bus::EventBus;

/// Result of a recorded interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionOutcome {
    pub status: OccurrenceStatus,
    pub record: InteractionRecord,
    pub priority: Priority,
}

/// Closes the loop on a delivered occurrence: finalizes it, adjusts the
/// template priority and logs the response as behavior.
pub struct InteractionRecorder {
    occurrences: Arc<dyn OccurrenceRepository>,
    feedback: Arc<dyn FeedbackUnitOfWork>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl InteractionRecorder {
    pub fn new(
        occurrences: Arc<dyn OccurrenceRepository>,
        feedback: Arc<dyn FeedbackUnitOfWork>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            occurrences,
            feedback,
            clock,
            event_bus,
        }
    }

    pub async fn record_interaction(
        &self,
        occurrence_id: OccurrenceId,
        kind: InteractionKind,
        metadata: serde_json::Value,
    ) -> Result<InteractionOutcome, EngineError> {
        let occurrence = self
            .occurrences
            .find_by_id(occurrence_id)
            .await?
            .ok_or_else(|| EngineError::not_found("occurrence", occurrence_id))?;

        if occurrence.status != OccurrenceStatus::Sent {
            return Err(EngineError::InvalidTransition {
                from: occurrence.status,
                to: kind.terminal_status(),
            });
        }

        let record = InteractionRecord::new(occurrence_id, kind, metadata, self.clock.now());
        let outcome = self.feedback.commit_feedback(record).await?;

        info!(
            occurrence_id = %occurrence_id,
            user_id = %outcome.occurrence.user_id,
            kind = %kind,
            status = %outcome.occurrence.status,
            priority = %outcome.template.priority,
            "Interaction recorded"
        );
        metrics::counter!("nudge_interactions_recorded_total", "kind" => kind.as_str()).increment(1);
        self.event_bus.publish(ReminderEvent::InteractionRecorded {
            interaction_id: outcome.record.id,
            occurrence_id,
            kind,
            status: outcome.occurrence.status,
            priority: outcome.template.priority,
            recorded_at: outcome.record.recorded_at,
        });

        Ok(InteractionOutcome {
            status: outcome.occurrence.status,
            record: outcome.record,
            priority: outcome.template.priority,
        })
    }

    /// Same as [`record_interaction`](Self::record_interaction) with the kind
    /// given as text (`"completed"`, `"DISMISSED"`, ...).
    pub async fn record_interaction_str(
        &self,
        occurrence_id: OccurrenceId,
        kind: &str,
        metadata: serde_json::Value,
    ) -> Result<InteractionOutcome, EngineError> {
        let kind: InteractionKind = kind.parse()?;
        self.record_interaction(occurrence_id, kind, metadata).await
    }
}
