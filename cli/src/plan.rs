// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

// Plan files
//
// YAML documents consumed by `nudge simulate` and `nudge run --seed`:
//
//   start: 2026-01-05T08:00:00Z    # optional, simulate only
//   rounds: 4                      # simulate only
//   step: 6h                       # simulate only
//   retrain: true                  # simulate only
//   models:
//     - type: scheduling
//       active: true
//       parameters: { min_offset_minutes: 20, max_offset_minutes: 90 }
//   users:
//     - name: alice
//       reminders:
//         - { label: Drink water, priority: 5, end_in: 1h, channel: email }
//       context:
//         - { location: office }
//       responses: [completed, dismissed]

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use nudge_core::{Channel, ModelType, NewReminder, UserId};

#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    #[serde(default = "default_rounds")]
    pub rounds: u32,

    #[serde(default = "default_step", with = "humantime_serde")]
    pub step: Duration,

    #[serde(default)]
    pub retrain: bool,

    #[serde(default)]
    pub models: Vec<ModelSeed>,

    #[serde(default)]
    pub users: Vec<UserSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSeed {
    #[serde(rename = "type")]
    pub model_type: String,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserSeed {
    pub name: String,

    #[serde(default)]
    pub reminders: Vec<ReminderSeed>,

    #[serde(default)]
    pub context: Vec<serde_json::Value>,

    /// Responses applied to this user's deliveries, in delivery order.
    #[serde(default)]
    pub responses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderSeed {
    pub label: String,

    #[serde(default = "default_priority")]
    pub priority: i64,

    /// End of the delivery window, relative to the plan start.
    #[serde(default, with = "humantime_serde")]
    pub end_in: Option<Duration>,

    #[serde(default)]
    pub channel: Option<String>,
}

fn default_rounds() -> u32 {
    3
}

fn default_step() -> Duration {
    Duration::from_secs(6 * 3600)
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i64 {
    5
}

impl Plan {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read plan file {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("Failed to parse plan file {:?}", path))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

impl ModelSeed {
    pub fn model_type(&self) -> Result<ModelType> {
        self.model_type
            .parse()
            .with_context(|| format!("Invalid model type '{}'", self.model_type))
    }
}

impl UserSeed {
    /// Stable id derived from the name, so repeated runs address the same user.
    pub fn user_id(&self) -> UserId {
        UserId(Uuid::new_v5(&Uuid::NAMESPACE_OID, self.name.as_bytes()))
    }
}

impl ReminderSeed {
    pub fn to_new_reminder(&self, user_id: UserId, start: DateTime<Utc>) -> Result<NewReminder> {
        let preferred_channel = self
            .channel
            .as_deref()
            .map(str::parse::<Channel>)
            .transpose()
            .with_context(|| format!("Invalid channel for reminder '{}'", self.label))?;
        let end_time = match self.end_in {
            Some(offset) => Some(start + chrono::Duration::from_std(offset).context("end_in out of range")?),
            None => None,
        };

        Ok(NewReminder {
            user_id,
            label: self.label.clone(),
            start_time: None,
            end_time,
            priority: self.priority,
            preferred_channel,
        })
    }
}
