// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Versioned prediction models and strategy resolution.
//!
//! Several versions of one type may be flagged active at the same time; the
//! registry always resolves to the highest active version.

use std::sync::Arc;
use tracing::info;

use crate::application::error::EngineError;
use crate::domain::clock::Clock;
use crate::domain::events::ReminderEvent;
use crate::domain::model::{ModelId, ModelType, PredictionModel};
use crate::domain::prediction::{ModelBackedStrategy, ModelInference, PredictionStrategy};
use crate::domain::repository::ModelRepository;
use crate::infrastructure::event_bus::EventBus;

pub struct ModelRegistry {
    repository: Arc<dyn ModelRepository>,
    inference: Arc<dyn ModelInference>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl ModelRegistry {
    pub fn new(
        repository: Arc<dyn ModelRepository>,
        inference: Arc<dyn ModelInference>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            repository,
            inference,
            clock,
            event_bus,
        }
    }

    /// Store the next version of `model_type`.
    pub async fn register_model(
        &self,
        model_type: ModelType,
        parameters: serde_json::Value,
        is_active: bool,
    ) -> Result<PredictionModel, EngineError> {
        let model = self
            .repository
            .insert_next_version(model_type, parameters, is_active, self.clock.now())
            .await?;

        info!(
            model_id = %model.id,
            model_type = %model.model_type,
            version = model.version,
            is_active = model.is_active,
            "Prediction model registered"
        );
        self.event_bus.publish(ReminderEvent::ModelRegistered {
            model_id: model.id,
            model_type: model.model_type,
            version: model.version,
            is_active: model.is_active,
            registered_at: model.created_at,
        });
        Ok(model)
    }

    pub async fn get_active_model(&self, model_type: ModelType) -> Result<Option<PredictionModel>, EngineError> {
        Ok(self.repository.find_active(model_type).await?)
    }

    pub async fn set_model_active(&self, id: ModelId, is_active: bool) -> Result<PredictionModel, EngineError> {
        let model = self.repository.set_active(id, is_active).await?;
        info!(model_id = %id, version = model.version, is_active, "Prediction model activation changed");
        Ok(model)
    }

    pub async fn list_models(&self, model_type: ModelType) -> Result<Vec<PredictionModel>, EngineError> {
        Ok(self.repository.list_by_type(model_type).await?)
    }

    /// Model-backed strategy when a `Scheduling` model is active, `fallback` otherwise.
    pub async fn scheduling_strategy(
        &self,
        fallback: Arc<dyn PredictionStrategy>,
    ) -> Result<Arc<dyn PredictionStrategy>, EngineError> {
        Ok(match self.get_active_model(ModelType::Scheduling).await? {
            Some(model) => Arc::new(ModelBackedStrategy::new(model, self.inference.clone())),
            None => fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::SystemClock;
    use crate::domain::prediction::HeuristicStrategy;
    use crate::infrastructure::inference::OffsetWindowInference;
    use crate::infrastructure::repositories::InMemoryReminderStore;
    use serde_json::json;

    fn registry() -> ModelRegistry {
        ModelRegistry::new(
            Arc::new(InMemoryReminderStore::new()),
            Arc::new(OffsetWindowInference),
            Arc::new(SystemClock),
            EventBus::new(16),
        )
    }

    #[tokio::test]
    async fn test_get_active_model_none_when_nothing_active() {
        let registry = registry();
        assert!(registry.get_active_model(ModelType::Scheduling).await.unwrap().is_none());

        registry.register_model(ModelType::Scheduling, json!({}), false).await.unwrap();
        assert!(registry.get_active_model(ModelType::Scheduling).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_highest_active_version_wins() {
        let registry = registry();
        let v1 = registry.register_model(ModelType::Scheduling, json!({}), true).await.unwrap();
        let v2 = registry.register_model(ModelType::Scheduling, json!({}), true).await.unwrap();
        let v3 = registry.register_model(ModelType::Scheduling, json!({}), false).await.unwrap();
        assert_eq!((v1.version, v2.version, v3.version), (1, 2, 3));

        let active = registry.get_active_model(ModelType::Scheduling).await.unwrap().unwrap();
        assert_eq!(active.id, v2.id);

        registry.set_model_active(v2.id, false).await.unwrap();
        let active = registry.get_active_model(ModelType::Scheduling).await.unwrap().unwrap();
        assert_eq!(active.id, v1.id);

        assert_eq!(registry.list_models(ModelType::Scheduling).await.unwrap().len(), 3);
        assert!(registry.list_models(ModelType::ChannelSelection).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_model_active_unknown_id() {
        let err = registry().set_model_active(ModelId::new(), true).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "prediction model", .. }));
    }

    #[tokio::test]
    async fn test_strategy_resolution() {
        let registry = registry();
        let fallback: Arc<dyn PredictionStrategy> = Arc::new(HeuristicStrategy::default());
        assert_eq!(registry.scheduling_strategy(fallback.clone()).await.unwrap().name(), "heuristic");

        registry.register_model(ModelType::ChannelSelection, json!({}), true).await.unwrap();
        assert_eq!(registry.scheduling_strategy(fallback.clone()).await.unwrap().name(), "heuristic");

        registry.register_model(ModelType::Scheduling, json!({}), true).await.unwrap();
        assert_eq!(registry.scheduling_strategy(fallback).await.unwrap().name(), "model");
    }
}
