// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Reminder Occurrence
//!
//! One concrete scheduled delivery of a [`crate::domain::ReminderTemplate`].
//!
//! ```text
//! Scheduled ──▶ Sent ──▶ Completed
//!                 ├────▶ Dismissed
//!                 └────▶ Expired   (opt-in TTL sweep)
//! ```
//!
//! Transitions are monotonic. The store applies them as a guarded
//! compare-and-set on the current status, so the check here is the single
//! source of truth for which edges exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::reminder::{Channel, ReminderId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OccurrenceId(pub Uuid);

impl OccurrenceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for OccurrenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccurrenceStatus {
    Scheduled,
    Sent,
    Completed,
    Dismissed,
    Expired,
}

impl OccurrenceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OccurrenceStatus::Completed | OccurrenceStatus::Dismissed | OccurrenceStatus::Expired
        )
    }

    pub fn can_transition_to(&self, next: OccurrenceStatus) -> bool {
        use OccurrenceStatus::*;
        matches!(
            (self, next),
            (Scheduled, Sent) | (Sent, Completed) | (Sent, Dismissed) | (Sent, Expired)
        )
    }
}

impl fmt::Display for OccurrenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OccurrenceStatus::Scheduled => "SCHEDULED",
            OccurrenceStatus::Sent => "SENT",
            OccurrenceStatus::Completed => "COMPLETED",
            OccurrenceStatus::Dismissed => "DISMISSED",
            OccurrenceStatus::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal occurrence transition {from} -> {to}")]
pub struct TransitionError {
    pub from: OccurrenceStatus,
    pub to: OccurrenceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderOccurrence {
    pub id: OccurrenceId,
    pub template_id: ReminderId,
    pub user_id: UserId,
    pub scheduled_time: DateTime<Utc>,
    pub status: OccurrenceStatus,
    pub channel: Channel,
    /// Confidence reported by a model-backed prediction; `None` for the heuristic.
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl ReminderOccurrence {
    /// Occurrences only ever start out `Scheduled`.
    pub fn scheduled(
        template_id: ReminderId,
        user_id: UserId,
        scheduled_time: DateTime<Utc>,
        channel: Channel,
        confidence: Option<f64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OccurrenceId::new(),
            template_id,
            user_id,
            scheduled_time,
            status: OccurrenceStatus::Scheduled,
            channel,
            confidence,
            created_at: now,
            sent_at: None,
            finalized_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == OccurrenceStatus::Scheduled && self.scheduled_time <= now
    }

    pub fn transition(&mut self, next: OccurrenceStatus, at: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError { from: self.status, to: next });
        }
        self.status = next;
        match next {
            OccurrenceStatus::Sent => self.sent_at = Some(at),
            s if s.is_terminal() => self.finalized_at = Some(at),
            _ => {}
        }
        Ok(())
    }
}
