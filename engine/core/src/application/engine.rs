// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Service wiring.
//!
//! [`ReminderEngine`] builds every application service over one shared
//! [`InMemoryReminderStore`], an event bus and an injected clock. Callers
//! supply the notification transport and the inference backend.

use std::sync::Arc;

use crate::application::behavior_store::BehaviorStore;
use crate::application::catalog::ReminderCatalog;
use crate::application::dispatcher::Dispatcher;
use crate::application::interaction_recorder::InteractionRecorder;
use crate::application::model_registry::ModelRegistry;
use crate::application::retraining::{ModelTrainer, RetrainingJob};
use crate::application::scheduler::Scheduler;
use crate::domain::clock::Clock;
use crate::domain::config::EngineConfig;
use crate::domain::notification::NotificationChannel;
use crate::domain::prediction::ModelInference;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::repositories::InMemoryReminderStore;

pub struct ReminderEngine {
    pub store: InMemoryReminderStore,
    pub event_bus: EventBus,
    pub catalog: Arc<ReminderCatalog>,
    pub registry: Arc<ModelRegistry>,
    pub behavior: Arc<BehaviorStore>,
    pub scheduler: Arc<Scheduler>,
    pub dispatcher: Arc<Dispatcher>,
    pub recorder: Arc<InteractionRecorder>,
    pub retraining: RetrainingJob,
    pub config: EngineConfig,
}

impl ReminderEngine {
    pub fn in_memory(
        config: EngineConfig,
        channel: Arc<dyn NotificationChannel>,
        inference: Arc<dyn ModelInference>,
        trainer: Arc<dyn ModelTrainer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = InMemoryReminderStore::new();
        let event_bus = EventBus::with_default_capacity();

        let catalog = Arc::new(ReminderCatalog::new(Arc::new(store.clone()), clock.clone(), event_bus.clone()));
        let registry = Arc::new(ModelRegistry::new(
            Arc::new(store.clone()),
            inference,
            clock.clone(),
            event_bus.clone(),
        ));
        let behavior = Arc::new(BehaviorStore::new(
            Arc::new(store.clone()),
            clock.clone(),
            config.behavior.recent_limit,
        ));
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            registry.clone(),
            behavior.clone(),
            clock.clone(),
            event_bus.clone(),
            &config,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(store.clone()),
            channel,
            clock.clone(),
            event_bus.clone(),
            &config,
        ));
        let recorder = Arc::new(InteractionRecorder::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            clock.clone(),
            event_bus.clone(),
        ));
        let retraining = RetrainingJob::new(
            registry.clone(),
            behavior.clone(),
            trainer,
            clock,
            event_bus.clone(),
            config.retraining.deadline,
        );

        Self {
            store,
            event_bus,
            catalog,
            registry,
            behavior,
            scheduler,
            dispatcher,
            recorder,
            retraining,
            config,
        }
    }
}
