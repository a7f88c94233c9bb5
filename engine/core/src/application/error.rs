// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

use crate::domain::occurrence::{OccurrenceStatus, TransitionError};
use crate::domain::repository::RepositoryError;
use crate::domain::reminder::ValidationError;

/// Errors surfaced by the engine's upward operations.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition {
        from: OccurrenceStatus,
        to: OccurrenceStatus,
    },

    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<TransitionError> for EngineError {
    fn from(err: TransitionError) -> Self {
        EngineError::InvalidTransition {
            from: err.from,
            to: err.to,
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Validation(e) => EngineError::Validation(e),
            RepositoryError::Transition(e) => e.into(),
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Repository(other),
        }
    }
}
