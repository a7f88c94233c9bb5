// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Model retraining as a background job.
//!
//! [`RetrainingJob::spawn`] gathers recent behavior for the requested users,
//! asks a [`ModelTrainer`] for new parameters and registers them as the next
//! model version. The task is bounded by a deadline and can be cancelled
//! through its [`RetrainingHandle`]. Scheduling and dispatch never wait on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::behavior_store::BehaviorStore;
use crate::application::model_registry::ModelRegistry;
use crate::domain::behavior::BehaviorObservation;
use crate::domain::clock::Clock;
use crate::domain::events::ReminderEvent;
use crate::domain::model::{ModelType, PredictionModel};
use crate::domain::reminder::UserId;
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone)]
pub struct TrainingRequest {
    pub model_type: ModelType,
    pub observations: Vec<BehaviorObservation>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
#[error("training failed: {0}")]
pub struct TrainingError(pub String);

/// Produces the parameter document of a new model version.
#[async_trait]
pub trait ModelTrainer: Send + Sync {
    async fn train(&self, request: &TrainingRequest) -> Result<serde_json::Value, TrainingError>;
}

/// Trainer for the offset-window inference backend.
///
/// Reads the `reminder_interaction` observations in the request and emits the
/// completion rate as `confidence` and the channel with the most completions
/// as `channel`. The offset window is left at the backend defaults.
#[derive(Debug, Default, Clone)]
pub struct ResponseRateTrainer;

#[async_trait]
impl ModelTrainer for ResponseRateTrainer {
    async fn train(&self, request: &TrainingRequest) -> Result<serde_json::Value, TrainingError> {
        let interactions: Vec<&serde_json::Value> = request
            .observations
            .iter()
            .map(|o| &o.features)
            .filter(|f| f["event"] == "reminder_interaction")
            .collect();
        if interactions.is_empty() {
            return Err(TrainingError("no interaction observations to learn from".to_string()));
        }

        let mut completions_by_channel: HashMap<&str, usize> = HashMap::new();
        let mut completions = 0usize;
        for features in &interactions {
            if features["kind"] == "COMPLETED" {
                completions += 1;
                if let Some(channel) = features["channel"].as_str() {
                    *completions_by_channel.entry(channel).or_default() += 1;
                }
            }
        }
        let channel = completions_by_channel
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
            .map(|(channel, _)| channel.to_string());

        Ok(serde_json::json!({
            "confidence": completions as f64 / interactions.len() as f64,
            "channel": channel,
            "samples": interactions.len(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetrainingOutcome {
    Registered(PredictionModel),
    Cancelled,
    DeadlineExceeded,
    Failed(String),
}

impl RetrainingOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RetrainingOutcome::Registered(_) => "registered",
            RetrainingOutcome::Cancelled => "cancelled",
            RetrainingOutcome::DeadlineExceeded => "deadline_exceeded",
            RetrainingOutcome::Failed(_) => "failed",
        }
    }
}

pub struct RetrainingHandle {
    cancellation: CancellationToken,
    task: JoinHandle<RetrainingOutcome>,
}

impl RetrainingHandle {
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> RetrainingOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => RetrainingOutcome::Failed(format!("retraining task aborted: {}", e)),
        }
    }
}

#[derive(Clone)]
pub struct RetrainingJob {
    registry: Arc<ModelRegistry>,
    behavior: Arc<BehaviorStore>,
    trainer: Arc<dyn ModelTrainer>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    deadline: Duration,
}

impl RetrainingJob {
    pub fn new(
        registry: Arc<ModelRegistry>,
        behavior: Arc<BehaviorStore>,
        trainer: Arc<dyn ModelTrainer>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        deadline: Duration,
    ) -> Self {
        Self {
            registry,
            behavior,
            trainer,
            clock,
            event_bus,
            deadline,
        }
    }

    /// Start a run in the background. `activate` flags the resulting version active.
    pub fn spawn(&self, model_type: ModelType, users: Vec<UserId>, activate: bool) -> RetrainingHandle {
        let cancellation = CancellationToken::new();
        let job = self.clone();
        let token = cancellation.clone();

        let task = tokio::spawn(async move {
            info!(model_type = %model_type, users = users.len(), deadline = ?job.deadline, "Retraining started");
            let outcome = tokio::select! {
                _ = token.cancelled() => RetrainingOutcome::Cancelled,
                result = tokio::time::timeout(job.deadline, job.train_and_register(model_type, &users, activate)) => {
                    result.unwrap_or(RetrainingOutcome::DeadlineExceeded)
                }
            };

            match &outcome {
                RetrainingOutcome::Registered(model) => {
                    info!(model_type = %model_type, version = model.version, "Retraining registered a new model version")
                }
                RetrainingOutcome::Failed(reason) => warn!(model_type = %model_type, reason = %reason, "Retraining failed"),
                other => warn!(model_type = %model_type, outcome = other.label(), "Retraining stopped"),
            }
            job.event_bus.publish(ReminderEvent::RetrainingFinished {
                model_type,
                outcome: outcome.label().to_string(),
                finished_at: job.clock.now(),
            });
            outcome
        });

        RetrainingHandle { cancellation, task }
    }

    async fn train_and_register(&self, model_type: ModelType, users: &[UserId], activate: bool) -> RetrainingOutcome {
        let mut observations = Vec::new();
        for user_id in users {
            match self.behavior.recent_observations(*user_id, self.behavior.max_limit()).await {
                Ok(mut recent) => observations.append(&mut recent),
                Err(e) => return RetrainingOutcome::Failed(e.to_string()),
            }
        }

        let request = TrainingRequest {
            model_type,
            observations,
            requested_at: self.clock.now(),
        };
        let parameters = match self.trainer.train(&request).await {
            Ok(parameters) => parameters,
            Err(e) => return RetrainingOutcome::Failed(e.to_string()),
        };

        match self.registry.register_model(model_type, parameters, activate).await {
            Ok(model) => RetrainingOutcome::Registered(model),
            Err(e) => RetrainingOutcome::Failed(e.to_string()),
        }
    }
}
