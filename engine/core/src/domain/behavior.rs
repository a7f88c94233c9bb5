// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Append-only behavioral signals used as prediction features.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::reminder::UserId;

/// Something the user did (e.g. completed a reminder at 10:42).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorObservation {
    pub user_id: UserId,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub features: serde_json::Value,
}

/// Something about the user's environment (weather, activity, calendar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSample {
    pub user_id: UserId,
    pub sampled_at: DateTime<Utc>,
    #[serde(default)]
    pub features: serde_json::Value,
}

impl BehaviorObservation {
    pub fn new(user_id: UserId, observed_at: DateTime<Utc>, features: serde_json::Value) -> Self {
        Self { user_id, observed_at, features }
    }
}

impl ContextSample {
    pub fn new(user_id: UserId, sampled_at: DateTime<Utc>, features: serde_json::Value) -> Self {
        Self { user_id, sampled_at, features }
    }
}
