// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Interaction records: a user's response to a delivered occurrence.
//! Immutable once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::behavior::BehaviorObservation;
use crate::domain::occurrence::{OccurrenceId, OccurrenceStatus, ReminderOccurrence, TransitionError};
use crate::domain::reminder::{ReminderTemplate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub Uuid);

impl InteractionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InteractionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionKind {
    Completed,
    Dismissed,
    Snoozed,
}

impl InteractionKind {
    /// Completion closes the occurrence as `Completed`; every other kind as `Dismissed`.
    pub fn terminal_status(&self) -> OccurrenceStatus {
        match self {
            InteractionKind::Completed => OccurrenceStatus::Completed,
            InteractionKind::Dismissed | InteractionKind::Snoozed => OccurrenceStatus::Dismissed,
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, InteractionKind::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Completed => "COMPLETED",
            InteractionKind::Dismissed => "DISMISSED",
            InteractionKind::Snoozed => "SNOOZED",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => Ok(InteractionKind::Completed),
            "DISMISSED" => Ok(InteractionKind::Dismissed),
            "SNOOZED" => Ok(InteractionKind::Snoozed),
            _ => Err(ValidationError::UnknownInteractionKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: InteractionId,
    pub occurrence_id: OccurrenceId,
    pub kind: InteractionKind,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl InteractionRecord {
    pub fn new(
        occurrence_id: OccurrenceId,
        kind: InteractionKind,
        metadata: serde_json::Value,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InteractionId::new(),
            occurrence_id,
            kind,
            recorded_at,
            metadata,
        }
    }
}

/// Everything one committed interaction changed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackOutcome {
    pub record: InteractionRecord,
    pub occurrence: ReminderOccurrence,
    pub template: ReminderTemplate,
    pub observation: BehaviorObservation,
}

/// Feedback rules for one interaction, applied to in-memory copies.
///
/// Finalizes the occurrence, nudges the template's priority (+1 on
/// completion, -1 otherwise, both saturating) and derives the behavior
/// observation to append. Callers persist the three results together.
pub fn apply_feedback(
    occurrence: &mut ReminderOccurrence,
    template: &mut ReminderTemplate,
    record: &InteractionRecord,
) -> Result<BehaviorObservation, TransitionError> {
    occurrence.transition(record.kind.terminal_status(), record.recorded_at)?;

    if record.kind.is_completion() {
        template.reinforce(record.recorded_at);
    } else {
        template.weaken(record.recorded_at);
    }

    let response_secs = occurrence
        .sent_at
        .map(|sent| (record.recorded_at - sent).num_seconds());

    Ok(BehaviorObservation::new(
        occurrence.user_id,
        record.recorded_at,
        serde_json::json!({
            "event": "reminder_interaction",
            "kind": record.kind,
            "template_id": template.id,
            "occurrence_id": occurrence.id,
            "channel": occurrence.channel,
            "scheduled_time": occurrence.scheduled_time,
            "response_secs": response_secs,
            "priority": template.priority.get(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reminder::{Channel, NewReminder, UserId};
    use chrono::{Duration, Utc};

    fn sent_pair(priority: i64) -> (ReminderOccurrence, ReminderTemplate) {
        let now = Utc::now();
        let template = ReminderTemplate::new(
            NewReminder {
                user_id: UserId::new(),
                label: "Hydrate".to_string(),
                start_time: None,
                end_time: None,
                priority,
                preferred_channel: None,
            },
            now,
        )
        .unwrap();
        let mut occurrence =
            ReminderOccurrence::scheduled(template.id, template.user_id, now, Channel::Push, None, now);
        occurrence.transition(OccurrenceStatus::Sent, now).unwrap();
        (occurrence, template)
    }

    #[test]
    fn test_feedback_completion_raises_priority() {
        let (mut occ, mut tpl) = sent_pair(5);
        let record = InteractionRecord::new(occ.id, InteractionKind::Completed, serde_json::Value::Null, occ.scheduled_time + Duration::minutes(3));
        let observation = apply_feedback(&mut occ, &mut tpl, &record).unwrap();
        assert_eq!(occ.status, OccurrenceStatus::Completed);
        assert_eq!(tpl.priority.get(), 6);
        assert_eq!(observation.features["response_secs"], 180);
        assert_eq!(observation.features["kind"], "COMPLETED");
    }

    #[test]
    fn test_feedback_snooze_lowers_priority_and_dismisses() {
        let (mut occ, mut tpl) = sent_pair(1);
        let record = InteractionRecord::new(occ.id, InteractionKind::Snoozed, serde_json::Value::Null, Utc::now());
        apply_feedback(&mut occ, &mut tpl, &record).unwrap();
        assert_eq!(occ.status, OccurrenceStatus::Dismissed);
        assert_eq!(tpl.priority.get(), 1);
    }

    #[test]
    fn test_feedback_rejects_finalized_occurrence() {
        let (mut occ, mut tpl) = sent_pair(5);
        let first = InteractionRecord::new(occ.id, InteractionKind::Completed, serde_json::Value::Null, Utc::now());
        apply_feedback(&mut occ, &mut tpl, &first).unwrap();
        let second = InteractionRecord::new(occ.id, InteractionKind::Dismissed, serde_json::Value::Null, Utc::now());
        assert!(apply_feedback(&mut occ, &mut tpl, &second).is_err());
        assert_eq!(tpl.priority.get(), 6);
    }

    #[test]
    fn test_kind_parsing_is_case_insensitive() {
        assert_eq!("completed".parse::<InteractionKind>().unwrap(), InteractionKind::Completed);
        assert_eq!(" Snoozed ".parse::<InteractionKind>().unwrap(), InteractionKind::Snoozed);
    }

    #[test]
    fn test_malformed_kind_is_validation_error() {
        let err = "viewed".parse::<InteractionKind>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownInteractionKind("viewed".to_string()));
    }

    #[test]
    fn test_non_completion_kinds_dismiss() {
        assert_eq!(InteractionKind::Completed.terminal_status(), OccurrenceStatus::Completed);
        assert_eq!(InteractionKind::Dismissed.terminal_status(), OccurrenceStatus::Dismissed);
        assert_eq!(InteractionKind::Snoozed.terminal_status(), OccurrenceStatus::Dismissed);
    }
}
