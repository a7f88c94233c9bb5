// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::interaction::{InteractionId, InteractionKind};
use crate::domain::model::{ModelId, ModelType};
use crate::domain::occurrence::{OccurrenceId, OccurrenceStatus};
use crate::domain::reminder::{Channel, Priority, ReminderId, UserId};

/// Why a template produced no occurrence in a scheduling pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The template still has an undelivered occurrence.
    Pending { existing: OccurrenceId },
    Conflict { existing: OccurrenceId },
    PredictionFailed { error: String },
    StorageFailed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReminderEvent {
    TemplateCreated {
        reminder_id: ReminderId,
        user_id: UserId,
        created_at: DateTime<Utc>,
    },
    TemplateUpdated {
        reminder_id: ReminderId,
        priority: Priority,
        updated_at: DateTime<Utc>,
    },
    TemplateDeactivated {
        reminder_id: ReminderId,
        deactivated_at: DateTime<Utc>,
    },
    OccurrenceScheduled {
        occurrence_id: OccurrenceId,
        reminder_id: ReminderId,
        user_id: UserId,
        scheduled_time: DateTime<Utc>,
        channel: Channel,
        strategy: String,
    },
    SchedulingSkipped {
        reminder_id: ReminderId,
        user_id: UserId,
        skip: SkipReason,
        skipped_at: DateTime<Utc>,
    },
    OccurrenceDispatched {
        occurrence_id: OccurrenceId,
        user_id: UserId,
        channel: Channel,
        delivered: bool,
        dispatched_at: DateTime<Utc>,
    },
    OccurrenceExpired {
        occurrence_id: OccurrenceId,
        expired_at: DateTime<Utc>,
    },
    InteractionRecorded {
        interaction_id: InteractionId,
        occurrence_id: OccurrenceId,
        kind: InteractionKind,
        status: OccurrenceStatus,
        priority: Priority,
        recorded_at: DateTime<Utc>,
    },
    ModelRegistered {
        model_id: ModelId,
        model_type: ModelType,
        version: u32,
        is_active: bool,
        registered_at: DateTime<Utc>,
    },
    RetrainingFinished {
        model_type: ModelType,
        outcome: String,
        finished_at: DateTime<Utc>,
    },
}

impl ReminderEvent {
    /// User the event concerns, when the event carries one.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            ReminderEvent::TemplateCreated { user_id, .. }
            | ReminderEvent::OccurrenceScheduled { user_id, .. }
            | ReminderEvent::SchedulingSkipped { user_id, .. }
            | ReminderEvent::OccurrenceDispatched { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }
}
