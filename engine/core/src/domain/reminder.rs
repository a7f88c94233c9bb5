// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Reminder Template Aggregate
//!
//! A [`ReminderTemplate`] is the user-owned definition of a recurring reminder:
//! label, optional delivery window, adaptive priority and channel preference.
//! Templates are never hard-deleted; deactivation flips [`ReminderTemplate::is_active`]
//! because occurrences keep referencing them.
//!
//! # Invariants
//!
//! - `priority ∈ [1, 10]` (enforced by [`Priority`]).
//! - If both `start_time` and `end_time` are set, `start_time < end_time`.
//! - `label` is not blank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of the user owning templates, occurrences and behavior records.
///
/// Users are managed outside the engine; this is an opaque reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderId(pub Uuid);

impl ReminderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ReminderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input validation failures surfaced to the caller. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("priority {0} is outside the allowed range [1, 10]")]
    PriorityOutOfRange(i64),

    #[error("time window is inverted: start {start} is not before end {end}")]
    InvertedWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("reminder label must not be empty")]
    EmptyLabel,

    #[error("unknown interaction kind: {0}")]
    UnknownInteractionKind(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("unknown model type: {0}")]
    UnknownModelType(String),
}

/// Adaptive priority of a template, always within `[1, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Priority = Priority(1);
    pub const MAX: Priority = Priority(10);

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value < Self::MIN.0 as i64 || value > Self::MAX.0 as i64 {
            return Err(ValidationError::PriorityOutOfRange(value));
        }
        Ok(Self(value as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// One step up, saturating at [`Priority::MAX`].
    pub fn raised(self) -> Self {
        Self((self.0 + 1).min(Self::MAX.0))
    }

    /// One step down, saturating at [`Priority::MIN`].
    pub fn lowered(self) -> Self {
        Self(self.0.saturating_sub(1).max(Self::MIN.0))
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<i64> for Priority {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for i64 {
    fn from(priority: Priority) -> Self {
        priority.0 as i64
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery channel for an occurrence. The engine only names the channel;
/// the transport behind it lives outside (see [`crate::domain::notification`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Push,
    Email,
    Sms,
    InApp,
    Voice,
    Webhook,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Push => "push",
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::InApp => "in_app",
            Channel::Voice => "voice",
            Channel::Webhook => "webhook",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "push" => Ok(Channel::Push),
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            "in_app" | "inapp" => Ok(Channel::InApp),
            "voice" => Ok(Channel::Voice),
            "webhook" => Ok(Channel::Webhook),
            _ => Err(ValidationError::UnknownChannel(s.to_string())),
        }
    }
}

/// Caller input for creating a template. Priority is raw so that an
/// out-of-range value surfaces as a [`ValidationError`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReminder {
    pub user_id: UserId,
    pub label: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub preferred_channel: Option<Channel>,
}

fn default_priority() -> i64 {
    Priority::default().get() as i64
}

/// Partial update. The nested `Option`s distinguish "leave as is" (`None`)
/// from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatePatch {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub start_time: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub end_time: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub preferred_channel: Option<Option<Channel>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderTemplate {
    pub id: ReminderId,
    pub user_id: UserId,
    pub label: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub preferred_channel: Option<Channel>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReminderTemplate {
    pub fn new(input: NewReminder, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let priority = Priority::new(input.priority)?;
        let template = Self {
            id: ReminderId::new(),
            user_id: input.user_id,
            label: input.label.trim().to_string(),
            start_time: input.start_time,
            end_time: input.end_time,
            priority,
            preferred_channel: input.preferred_channel,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        template.validate()?;
        Ok(template)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.label.is_empty() {
            return Err(ValidationError::EmptyLabel);
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start >= end {
                return Err(ValidationError::InvertedWindow { start, end });
            }
        }
        Ok(())
    }

    /// Apply a patch atomically: either every field changes or none does.
    pub fn apply(&mut self, patch: TemplatePatch, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let mut candidate = self.clone();
        if let Some(label) = patch.label {
            candidate.label = label.trim().to_string();
        }
        if let Some(start) = patch.start_time {
            candidate.start_time = start;
        }
        if let Some(end) = patch.end_time {
            candidate.end_time = end;
        }
        if let Some(priority) = patch.priority {
            candidate.priority = Priority::new(priority)?;
        }
        if let Some(channel) = patch.preferred_channel {
            candidate.preferred_channel = channel;
        }
        if let Some(active) = patch.is_active {
            candidate.is_active = active;
        }
        candidate.validate()?;
        candidate.updated_at = now;
        *self = candidate;
        Ok(())
    }

    /// Returns `true` if the flag actually changed.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.updated_at = now;
        true
    }

    pub fn reinforce(&mut self, now: DateTime<Utc>) {
        self.priority = self.priority.raised();
        self.updated_at = now;
    }

    pub fn weaken(&mut self, now: DateTime<Utc>) {
        self.priority = self.priority.lowered();
        self.updated_at = now;
    }
}
