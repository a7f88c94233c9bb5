// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Parameter-driven inference backend.
//!
//! [`OffsetWindowInference`] evaluates a registered model by reading its
//! `parameters` document:
//!
//! ```yaml
//! min_offset_minutes: 15     # default 15
//! max_offset_minutes: 120    # default 120
//! channel: email             # optional, overrides the template preference
//! confidence: 0.8            # optional
//! ```
//!
//! The delivery time is `now + U(min, max)` minutes, clipped to the
//! template's `end_time` when that is still ahead. It stands in for a
//! trained model until one is plugged in behind `ModelInference`.

use async_trait::async_trait;
use chrono::Duration;
use rand::Rng;
use serde::Deserialize;

use crate::domain::model::PredictionModel;
use crate::domain::prediction::{ModelInference, Prediction, PredictionError, PredictionInput};
use crate::domain::reminder::Channel;

const DEFAULT_MIN_OFFSET_MINUTES: i64 = 15;
const DEFAULT_MAX_OFFSET_MINUTES: i64 = 120;
/// One year.
const MAX_OFFSET_MINUTES: i64 = 525_600;

#[derive(Debug, Deserialize)]
struct OffsetWindowParams {
    #[serde(default = "default_min")]
    min_offset_minutes: i64,
    #[serde(default = "default_max")]
    max_offset_minutes: i64,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

fn default_min() -> i64 {
    DEFAULT_MIN_OFFSET_MINUTES
}

fn default_max() -> i64 {
    DEFAULT_MAX_OFFSET_MINUTES
}

#[derive(Debug, Default, Clone)]
pub struct OffsetWindowInference;

impl OffsetWindowInference {
    fn params(model: &PredictionModel) -> Result<OffsetWindowParams, PredictionError> {
        let value = if model.parameters.is_null() {
            serde_json::json!({})
        } else {
            model.parameters.clone()
        };
        let params: OffsetWindowParams = serde_json::from_value(value)
            .map_err(|e| PredictionError::Inference(format!("model v{} parameters: {}", model.version, e)))?;

        if params.min_offset_minutes < 0
            || params.max_offset_minutes < params.min_offset_minutes
            || params.max_offset_minutes > MAX_OFFSET_MINUTES
        {
            return Err(PredictionError::Inference(format!(
                "model v{} has invalid offset window [{}, {}]",
                model.version, params.min_offset_minutes, params.max_offset_minutes
            )));
        }
        Ok(params)
    }
}

#[async_trait]
impl ModelInference for OffsetWindowInference {
    async fn infer(&self, model: &PredictionModel, input: &PredictionInput) -> Result<Prediction, PredictionError> {
        let params = Self::params(model)?;
        let channel = params
            .channel
            .as_deref()
            .map(|c| c.parse::<Channel>())
            .transpose()
            .map_err(|e| PredictionError::Inference(e.to_string()))?;

        let offset = rand::rng().random_range(params.min_offset_minutes..=params.max_offset_minutes);
        let mut delivery_time = Duration::try_minutes(offset)
            .and_then(|offset| input.now.checked_add_signed(offset))
            .ok_or_else(|| {
                PredictionError::Inference(format!("model v{} offset of {} minutes is out of range", model.version, offset))
            })?;
        if let Some(end) = input.template.end_time {
            if end > input.now && delivery_time > end {
                delivery_time = end;
            }
        }

        Ok(Prediction {
            delivery_time,
            channel,
            confidence: params.confidence,
        })
    }
}
