// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Abstract delivery capability. The concrete transport (push, email,
//! in-app) is supplied from outside the engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::occurrence::ReminderOccurrence;
use crate::domain::reminder::{Channel, UserId};

#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("channel {channel} rejected delivery: {reason}")]
    Rejected { channel: Channel, reason: String },

    #[error("channel {0} is unavailable")]
    Unavailable(Channel),

    #[error("delivery timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, user_id: UserId, occurrence: &ReminderOccurrence) -> Result<(), DeliveryError>;
}
