// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use tracing::info;

use crate::domain::notification::{DeliveryError, NotificationChannel};
use crate::domain::occurrence::ReminderOccurrence;
use crate::domain::reminder::UserId;

/// Channel that only writes the delivery to the log. Used by `nudge run`
/// and `nudge simulate` where no real transport is configured.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotificationChannel;

#[async_trait]
impl NotificationChannel for LoggingNotificationChannel {
    async fn send(&self, user_id: UserId, occurrence: &ReminderOccurrence) -> Result<(), DeliveryError> {
        info!(
            user_id = %user_id,
            occurrence_id = %occurrence.id,
            reminder_id = %occurrence.template_id,
            channel = %occurrence.channel,
            scheduled_time = %occurrence.scheduled_time,
            "Delivering reminder"
        );
        Ok(())
    }
}
