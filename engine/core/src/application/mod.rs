// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod error;
pub mod catalog;
pub mod model_registry;
pub mod behavior_store;
pub mod scheduler;
pub mod dispatcher;
pub mod interaction_recorder;
pub mod retraining;
pub mod engine;

// Re-export services for convenience
pub use error::EngineError;
pub use catalog::ReminderCatalog;
pub use model_registry::ModelRegistry;
pub use behavior_store::BehaviorStore;
pub use scheduler::{Scheduler, SchedulingReport};
pub use dispatcher::Dispatcher;
pub use interaction_recorder::{InteractionOutcome, InteractionRecorder};
pub use retraining::{
    ModelTrainer, ResponseRateTrainer, RetrainingHandle, RetrainingJob, RetrainingOutcome, TrainingError, TrainingRequest,
};
pub use engine::ReminderEngine;
