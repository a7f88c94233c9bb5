// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! Pure types and contracts for the reminder engine. No I/O.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`reminder`] | `ReminderTemplate`, `Priority`, `Channel`, `TemplatePatch` |
//! | [`occurrence`] | `ReminderOccurrence`, `OccurrenceStatus` |
//! | [`interaction`] | `InteractionRecord`, `InteractionKind` |
//! | [`model`] | `PredictionModel`, `ModelType` |
//! | [`behavior`] | `BehaviorObservation`, `ContextSample` |
//! | [`prediction`] | `PredictionStrategy`, `HeuristicStrategy`, `ModelBackedStrategy` |
//! | [`notification`] | `NotificationChannel` |
//! | [`repository`] | Persistence contracts |
//! | [`events`] | `ReminderEvent` |
//! | [`config`] | `EngineConfig` |

pub mod reminder;
pub mod occurrence;
pub mod interaction;
pub mod model;
pub mod behavior;
pub mod prediction;
pub mod notification;
pub mod clock;
pub mod repository;
pub mod events;
pub mod config;

pub use reminder::{Channel, NewReminder, Priority, ReminderId, ReminderTemplate, TemplatePatch, UserId, ValidationError};
pub use occurrence::{OccurrenceId, OccurrenceStatus, ReminderOccurrence, TransitionError};
pub use interaction::{FeedbackOutcome, InteractionId, InteractionKind, InteractionRecord};
pub use model::{ModelId, ModelType, PredictionModel};
pub use behavior::{BehaviorObservation, ContextSample};
