// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

use nudge_core::application::{ReminderEngine, ResponseRateTrainer};
use nudge_core::domain::clock::ManualClock;
use nudge_core::domain::config::EngineConfig;
use nudge_core::domain::model::PredictionModel;
use nudge_core::domain::notification::{DeliveryError, NotificationChannel};
use nudge_core::domain::prediction::{ModelInference, Prediction, PredictionError, PredictionInput};
use nudge_core::{NewReminder, OccurrenceId, ReminderOccurrence, UserId};

/// Records every delivery; optionally fails them all.
#[derive(Default)]
pub struct RecordingChannel {
    pub delivered: Mutex<Vec<OccurrenceId>>,
    pub fail: bool,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, _user_id: UserId, occurrence: &ReminderOccurrence) -> Result<(), DeliveryError> {
        self.delivered.lock().push(occurrence.id);
        if self.fail {
            return Err(DeliveryError::Rejected {
                channel: occurrence.channel,
                reason: "mailbox full".to_string(),
            });
        }
        Ok(())
    }
}

/// Predicts `now + offset`; fails for templates whose label starts with "broken".
pub struct ScriptedInference {
    pub offset: Duration,
}

#[async_trait]
impl ModelInference for ScriptedInference {
    async fn infer(&self, _model: &PredictionModel, input: &PredictionInput) -> Result<Prediction, PredictionError> {
        if input.template.label.starts_with("broken") {
            return Err(PredictionError::Inference("model crashed".to_string()));
        }
        Ok(Prediction {
            delivery_time: input.now + self.offset,
            channel: None,
            confidence: Some(0.5),
        })
    }
}

pub struct Harness {
    pub engine: ReminderEngine,
    pub clock: Arc<ManualClock>,
    pub channel: Arc<RecordingChannel>,
}

pub fn harness_with(config: EngineConfig, channel: RecordingChannel) -> Harness {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let channel = Arc::new(channel);
    let engine = ReminderEngine::in_memory(
        config,
        channel.clone(),
        Arc::new(ScriptedInference { offset: Duration::minutes(30) }),
        Arc::new(ResponseRateTrainer),
        clock.clone(),
    );
    Harness { engine, clock, channel }
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default(), RecordingChannel::default())
}

pub fn reminder(user_id: UserId, label: &str, priority: i64, end_time: Option<DateTime<Utc>>) -> NewReminder {
    NewReminder {
        user_id,
        label: label.to_string(),
        start_time: None,
        end_time,
        priority,
        preferred_channel: None,
    }
}
