// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Versioned prediction-model records.
//!
//! Several versions of one [`ModelType`] may coexist and more than one may be
//! flagged active at the same time; resolution picks the highest active version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::reminder::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(pub Uuid);

impl ModelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    Scheduling,
    ChannelSelection,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Scheduling => f.write_str("SCHEDULING"),
            ModelType::ChannelSelection => f.write_str("CHANNEL_SELECTION"),
        }
    }
}

impl FromStr for ModelType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SCHEDULING" => Ok(ModelType::Scheduling),
            "CHANNEL_SELECTION" => Ok(ModelType::ChannelSelection),
            _ => Err(ValidationError::UnknownModelType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionModel {
    pub id: ModelId,
    pub model_type: ModelType,
    /// Per-type version, starting at 1.
    pub version: u32,
    pub is_active: bool,
    /// Opaque to the engine; interpreted by the inference backend.
    pub parameters: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl PredictionModel {
    pub fn new(
        model_type: ModelType,
        version: u32,
        parameters: serde_json::Value,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ModelId::new(),
            model_type,
            version,
            is_active,
            parameters,
            created_at,
        }
    }
}

/// Highest-version active model of `model_type`, if any.
///
/// Ties on version cannot happen through the registry, but are broken by the
/// later `created_at` to keep the result deterministic for hand-built slices.
pub fn select_active<'a, I>(models: I, model_type: ModelType) -> Option<&'a PredictionModel>
where
    I: IntoIterator<Item = &'a PredictionModel>,
{
    models
        .into_iter()
        .filter(|m| m.model_type == model_type && m.is_active)
        .max_by(|a, b| a.version.cmp(&b.version).then(a.created_at.cmp(&b.created_at)))
}
