// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts, one per aggregate, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ReminderRepository` | `ReminderTemplate` | `InMemoryReminderStore` |
//! | `OccurrenceRepository` | `ReminderOccurrence` | `InMemoryReminderStore` |
//! | `InteractionRepository` | `InteractionRecord` | `InMemoryReminderStore` |
//! | `ModelRepository` | `PredictionModel` | `InMemoryReminderStore` |
//! | `BehaviorRepository` | `BehaviorObservation`, `ContextSample` | `InMemoryReminderStore` |
//! | `FeedbackUnitOfWork` | interaction + occurrence + template | `InMemoryReminderStore` |
//!
//! ## Concurrency contract
//!
//! - `OccurrenceRepository::transition` is a compare-and-set on the current
//!   status. It is the only way an occurrence changes state.
//! - `OccurrenceRepository::insert_if_clear` checks the pending and conflict
//!   rules and inserts as one step.
//! - `ReminderRepository::update_with` applies a read-modify-write under the
//!   store's write serialization so concurrent priority updates are not lost.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::domain::behavior::{BehaviorObservation, ContextSample};
use crate::domain::interaction::{FeedbackOutcome, InteractionRecord};
use crate::domain::model::{ModelId, ModelType, PredictionModel};
use crate::domain::occurrence::{OccurrenceId, OccurrenceStatus, ReminderOccurrence, TransitionError};
use crate::domain::reminder::{ReminderId, ReminderTemplate, UserId, ValidationError};

/// Repository errors
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transition rejected: {0}")]
    Transition(#[from] TransitionError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// Result of an atomic conflict-checked insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// The template already has an occurrence waiting to be dispatched.
    Pending { existing: OccurrenceId },
    /// A `Scheduled` occurrence of the same user already sits inside the buffer.
    Conflict { existing: OccurrenceId, existing_time: DateTime<Utc> },
}

/// Result of a guarded status transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(ReminderOccurrence),
    /// The stored status no longer matched the expected one; nothing was written.
    Stale { current: OccurrenceStatus },
}

pub type TemplateMutation<'a> = &'a (dyn Fn(&mut ReminderTemplate) -> Result<(), ValidationError> + Send + Sync);

#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Save template (create or replace)
    async fn save(&self, template: &ReminderTemplate) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: ReminderId) -> Result<Option<ReminderTemplate>, RepositoryError>;

    /// Templates of a user, oldest first
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<ReminderTemplate>, RepositoryError>;

    /// Users that own at least one active template
    async fn users_with_active_templates(&self) -> Result<Vec<UserId>, RepositoryError>;

    /// Serialized read-modify-write. `NotFound` if the id is unknown; the
    /// mutation's `ValidationError` leaves the stored template untouched.
    async fn update_with(
        &self,
        id: ReminderId,
        mutation: TemplateMutation<'_>,
    ) -> Result<ReminderTemplate, RepositoryError>;
}

#[async_trait]
pub trait OccurrenceRepository: Send + Sync {
    /// Insert unless the template already has a `Scheduled` occurrence, or
    /// another `Scheduled` occurrence of the same user lies within `±buffer`
    /// (inclusive) of `occurrence.scheduled_time`.
    async fn insert_if_clear(
        &self,
        occurrence: &ReminderOccurrence,
        buffer: Duration,
    ) -> Result<InsertOutcome, RepositoryError>;

    async fn find_by_id(&self, id: OccurrenceId) -> Result<Option<ReminderOccurrence>, RepositoryError>;

    /// `Scheduled` occurrences with `scheduled_time <= now`, earliest first
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ReminderOccurrence>, RepositoryError>;

    /// `Sent` occurrences with `sent_at <= cutoff`
    async fn find_sent_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ReminderOccurrence>, RepositoryError>;

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<ReminderOccurrence>, RepositoryError>;

    async fn find_by_template(&self, template_id: ReminderId) -> Result<Vec<ReminderOccurrence>, RepositoryError>;

    /// Compare-and-set of the status field.
    async fn transition(
        &self,
        id: OccurrenceId,
        expected: OccurrenceStatus,
        next: OccurrenceStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, RepositoryError>;
}

#[async_trait]
pub trait InteractionRepository: Send + Sync {
    async fn find_by_occurrence(&self, occurrence_id: OccurrenceId) -> Result<Vec<InteractionRecord>, RepositoryError>;
}

/// Applies one interaction's writes (record, occurrence status, template
/// priority, behavior observation) as a single unit.
#[async_trait]
pub trait FeedbackUnitOfWork: Send + Sync {
    async fn commit_feedback(&self, record: InteractionRecord) -> Result<FeedbackOutcome, RepositoryError>;
}

#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Allocate the next version of `model_type` and store it.
    async fn insert_next_version(
        &self,
        model_type: ModelType,
        parameters: serde_json::Value,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Result<PredictionModel, RepositoryError>;

    async fn find_by_id(&self, id: ModelId) -> Result<Option<PredictionModel>, RepositoryError>;

    /// Highest-version active model of the type
    async fn find_active(&self, model_type: ModelType) -> Result<Option<PredictionModel>, RepositoryError>;

    /// All versions of the type, ascending
    async fn list_by_type(&self, model_type: ModelType) -> Result<Vec<PredictionModel>, RepositoryError>;

    async fn set_active(&self, id: ModelId, is_active: bool) -> Result<PredictionModel, RepositoryError>;
}

#[async_trait]
pub trait BehaviorRepository: Send + Sync {
    async fn append_observation(&self, observation: BehaviorObservation) -> Result<(), RepositoryError>;

    async fn append_context(&self, sample: ContextSample) -> Result<(), RepositoryError>;

    /// Most recent first
    async fn recent_observations(&self, user_id: UserId, limit: usize) -> Result<Vec<BehaviorObservation>, RepositoryError>;

    /// Most recent first
    async fn recent_context(&self, user_id: UserId, limit: usize) -> Result<Vec<ContextSample>, RepositoryError>;
}
