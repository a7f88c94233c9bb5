// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use crate::application::error::EngineError;
use crate::domain::behavior::{BehaviorObservation, ContextSample};
use crate::domain::clock::Clock;
use crate::domain::repository::BehaviorRepository;
use crate::domain::reminder::UserId;

/// Append-only behavior and context log. Reads are newest first and capped
/// at `max_limit`.
pub struct BehaviorStore {
    repository: Arc<dyn BehaviorRepository>,
    clock: Arc<dyn Clock>,
    max_limit: usize,
}

impl BehaviorStore {
    pub fn new(repository: Arc<dyn BehaviorRepository>, clock: Arc<dyn Clock>, max_limit: usize) -> Self {
        Self {
            repository,
            clock,
            max_limit,
        }
    }

    pub fn max_limit(&self) -> usize {
        self.max_limit
    }

    pub async fn append_observation(
        &self,
        user_id: UserId,
        features: serde_json::Value,
    ) -> Result<BehaviorObservation, EngineError> {
        let observation = BehaviorObservation::new(user_id, self.clock.now(), features);
        self.repository.append_observation(observation.clone()).await?;
        Ok(observation)
    }

    pub async fn append_context(
        &self,
        user_id: UserId,
        features: serde_json::Value,
    ) -> Result<ContextSample, EngineError> {
        let sample = ContextSample::new(user_id, self.clock.now(), features);
        self.repository.append_context(sample.clone()).await?;
        Ok(sample)
    }

    pub async fn recent_observations(&self, user_id: UserId, limit: usize) -> Result<Vec<BehaviorObservation>, EngineError> {
        Ok(self
            .repository
            .recent_observations(user_id, limit.min(self.max_limit))
            .await?)
    }

    pub async fn recent_context(&self, user_id: UserId, limit: usize) -> Result<Vec<ContextSample>, EngineError> {
        Ok(self.repository.recent_context(user_id, limit.min(self.max_limit)).await?)
    }
}
