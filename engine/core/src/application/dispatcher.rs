// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Dispatcher
//!
//! Sweeps due `Scheduled` occurrences and hands them to the notification
//! channel. Each occurrence is claimed with a compare-and-set
//! `Scheduled -> Sent`; only the sweep that wins the claim sends, so
//! overlapping sweeps deliver an occurrence at most once.
//!
//! A failed or timed-out send is logged and the occurrence stays `Sent`.
//! There is no automatic retry.

use chrono::Duration;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::error::EngineError;
use crate::domain::clock::Clock;
use crate::domain::config::{to_chrono, EngineConfig};
use crate::domain::events::ReminderEvent;
use crate::domain::notification::{DeliveryError, NotificationChannel};
use crate::domain::occurrence::{OccurrenceStatus, ReminderOccurrence};
use crate::domain::repository::{OccurrenceRepository, TransitionOutcome};
use crate::infrastructure::event_bus::EventBus;

pub struct Dispatcher {
    occurrences: Arc<dyn OccurrenceRepository>,
    channel: Arc<dyn NotificationChannel>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    send_timeout: std::time::Duration,
    sent_ttl: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        occurrences: Arc<dyn OccurrenceRepository>,
        channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        config: &EngineConfig,
    ) -> Self {
        Self {
            occurrences,
            channel,
            clock,
            event_bus,
            send_timeout: config.dispatch.send_timeout,
            sent_ttl: config.lifecycle.sent_ttl.map(to_chrono),
        }
    }

    /// Claim and deliver every due occurrence. Returns how many this sweep
    /// moved to `Sent`.
    pub async fn trigger_pending_reminders(&self) -> Result<usize, EngineError> {
        let now = self.clock.now();
        let due = self.occurrences.find_due(now).await?;
        if due.is_empty() {
            return Ok(0);
        }
        debug!(due = due.len(), "Dispatch sweep started");

        let mut claimed = 0;
        for candidate in due {
            let occurrence = match self
                .occurrences
                .transition(candidate.id, OccurrenceStatus::Scheduled, OccurrenceStatus::Sent, now)
                .await
            {
                Ok(TransitionOutcome::Applied(occurrence)) => occurrence,
                Ok(TransitionOutcome::Stale { current }) => {
                    debug!(occurrence_id = %candidate.id, status = %current, "Occurrence already claimed");
                    continue;
                }
                Err(e) => {
                    warn!(occurrence_id = %candidate.id, error = %e, "Failed to claim occurrence");
                    continue;
                }
            };
            claimed += 1;
            metrics::counter!("nudge_occurrences_dispatched_total", "channel" => occurrence.channel.as_str()).increment(1);

            let delivered = match self.deliver(&occurrence).await {
                Ok(()) => {
                    info!(
                        occurrence_id = %occurrence.id,
                        user_id = %occurrence.user_id,
                        channel = %occurrence.channel,
                        "Reminder delivered"
                    );
                    true
                }
                Err(e) => {
                    warn!(
                        occurrence_id = %occurrence.id,
                        user_id = %occurrence.user_id,
                        channel = %occurrence.channel,
                        error = %e,
                        "Delivery failed; occurrence stays SENT"
                    );
                    metrics::counter!("nudge_delivery_failures_total", "channel" => occurrence.channel.as_str())
                        .increment(1);
                    false
                }
            };

            self.event_bus.publish(ReminderEvent::OccurrenceDispatched {
                occurrence_id: occurrence.id,
                user_id: occurrence.user_id,
                channel: occurrence.channel,
                delivered,
                dispatched_at: now,
            });
        }

        Ok(claimed)
    }

    async fn deliver(&self, occurrence: &ReminderOccurrence) -> Result<(), DeliveryError> {
        match tokio::time::timeout(self.send_timeout, self.channel.send(occurrence.user_id, occurrence)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.send_timeout)),
        }
    }

    /// Move `Sent` occurrences older than the configured TTL to `Expired`.
    /// A no-op when no TTL is configured.
    pub async fn expire_unanswered(&self) -> Result<usize, EngineError> {
        let Some(ttl) = self.sent_ttl else {
            return Ok(0);
        };
        let now = self.clock.now();
        let stale = self.occurrences.find_sent_before(now - ttl).await?;

        let mut expired = 0;
        for occurrence in stale {
            match self
                .occurrences
                .transition(occurrence.id, OccurrenceStatus::Sent, OccurrenceStatus::Expired, now)
                .await
            {
                Ok(TransitionOutcome::Applied(_)) => {
                    expired += 1;
                    debug!(occurrence_id = %occurrence.id, "Unanswered occurrence expired");
                    self.event_bus.publish(ReminderEvent::OccurrenceExpired {
                        occurrence_id: occurrence.id,
                        expired_at: now,
                    });
                }
                // An interaction got there first.
                Ok(TransitionOutcome::Stale { .. }) => {}
                Err(e) => warn!(occurrence_id = %occurrence.id, error = %e, "Failed to expire occurrence"),
            }
        }
        if expired > 0 {
            info!(expired, "Expired unanswered occurrences");
        }
        Ok(expired)
    }

    /// Sweep every `period` until `cancellation` fires.
    pub async fn run(&self, period: std::time::Duration, cancellation: CancellationToken) {
        info!(interval = ?period, "Starting dispatcher loop");

        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.trigger_pending_reminders().await {
                        Ok(0) => {}
                        Ok(sent) => debug!(sent, "Dispatch sweep completed"),
                        Err(e) => warn!("Dispatch sweep failed: {}", e),
                    }
                    if let Err(e) = self.expire_unanswered().await {
                        warn!("Expiry sweep failed: {}", e);
                    }
                }
                _ = cancellation.cancelled() => {
                    info!("Shutdown signal received, stopping dispatcher");
                    break;
                }
            }
        }

        info!("Dispatcher loop stopped");
    }
}
