// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Prediction Strategies
//!
//! A [`PredictionStrategy`] proposes the delivery time (and optionally the
//! channel) of a template's next occurrence. Two variants exist:
//!
//! | Strategy | Selected when | Behavior |
//! |----------|---------------|----------|
//! | [`HeuristicStrategy`] | no active `SCHEDULING` model | uniform instant in `[now, end_time]`, else `now + U(1h, 5h)` |
//! | [`ModelBackedStrategy`] | an active `SCHEDULING` model exists | delegates to a [`ModelInference`] backend |
//!
//! The scheduler resolves the variant per call through the model registry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::behavior::{BehaviorObservation, ContextSample};
use crate::domain::model::PredictionModel;
use crate::domain::reminder::{Channel, ReminderTemplate};

/// Features handed to a strategy.
#[derive(Debug, Clone)]
pub struct PredictionInput {
    pub template: ReminderTemplate,
    pub recent_behavior: Vec<BehaviorObservation>,
    pub recent_context: Vec<ContextSample>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub delivery_time: DateTime<Utc>,
    /// `None` leaves the choice to the template preference / engine default.
    pub channel: Option<Channel>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Error)]
pub enum PredictionError {
    #[error("model inference failed: {0}")]
    Inference(String),

    #[error("prediction timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("prediction output rejected: {0}")]
    InvalidOutput(String),
}

#[async_trait]
pub trait PredictionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn predict(&self, input: &PredictionInput) -> Result<Prediction, PredictionError>;
}

/// Contract for whatever evaluates a [`PredictionModel`]. Its internals are
/// outside the engine.
#[async_trait]
pub trait ModelInference: Send + Sync {
    async fn infer(
        &self,
        model: &PredictionModel,
        input: &PredictionInput,
    ) -> Result<Prediction, PredictionError>;
}

/// Fallback used when no scheduling model is active.
#[derive(Debug, Clone)]
pub struct HeuristicStrategy {
    min_offset: Duration,
    max_offset: Duration,
}

impl HeuristicStrategy {
    pub fn new(min_offset: Duration, max_offset: Duration) -> Self {
        Self { min_offset, max_offset }
    }

    /// Pure candidate computation, `rng` injected for reproducibility.
    pub fn candidate<R: Rng + ?Sized>(
        &self,
        template: &ReminderTemplate,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> DateTime<Utc> {
        if let Some(end) = template.end_time {
            if now < end {
                let span_ms = (end - now).num_milliseconds();
                return now + Duration::milliseconds(rng.random_range(0..=span_ms));
            }
        }
        let min_ms = self.min_offset.num_milliseconds();
        let max_ms = self.max_offset.num_milliseconds().max(min_ms);
        now + Duration::milliseconds(rng.random_range(min_ms..=max_ms))
    }
}

impl Default for HeuristicStrategy {
    fn default() -> Self {
        Self::new(Duration::hours(1), Duration::hours(5))
    }
}

#[async_trait]
impl PredictionStrategy for HeuristicStrategy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn predict(&self, input: &PredictionInput) -> Result<Prediction, PredictionError> {
        let delivery_time = self.candidate(&input.template, input.now, &mut rand::rng());
        Ok(Prediction {
            delivery_time,
            channel: None,
            confidence: None,
        })
    }
}

/// Strategy backed by a registered model version.
pub struct ModelBackedStrategy {
    model: PredictionModel,
    inference: Arc<dyn ModelInference>,
}

impl ModelBackedStrategy {
    pub fn new(model: PredictionModel, inference: Arc<dyn ModelInference>) -> Self {
        Self { model, inference }
    }

    pub fn model(&self) -> &PredictionModel {
        &self.model
    }
}

#[async_trait]
impl PredictionStrategy for ModelBackedStrategy {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn predict(&self, input: &PredictionInput) -> Result<Prediction, PredictionError> {
        let prediction = self.inference.infer(&self.model, input).await?;

        if prediction.delivery_time < input.now {
            return Err(PredictionError::InvalidOutput(format!(
                "delivery time {} lies in the past",
                prediction.delivery_time
            )));
        }
        if let Some(confidence) = prediction.confidence {
            if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
                return Err(PredictionError::InvalidOutput(format!(
                    "confidence {} outside [0, 1]",
                    confidence
                )));
            }
        }
        Ok(prediction)
    }
}
