// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Engine construction and seeding shared by `simulate` and `run`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use nudge_core::application::{ReminderEngine, ResponseRateTrainer};
use nudge_core::domain::clock::Clock;
use nudge_core::domain::config::EngineConfigManifest;
use nudge_core::infrastructure::channels::LoggingNotificationChannel;
use nudge_core::infrastructure::inference::OffsetWindowInference;
use nudge_core::UserId;

use crate::plan::Plan;

pub fn build_engine(config_path: Option<PathBuf>, clock: Arc<dyn Clock>) -> Result<ReminderEngine> {
    let manifest = EngineConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    manifest.validate().context("Configuration validation failed")?;
    info!(name = %manifest.metadata.name, "Configuration loaded");

    Ok(ReminderEngine::in_memory(
        manifest.spec,
        Arc::new(LoggingNotificationChannel),
        Arc::new(OffsetWindowInference),
        Arc::new(ResponseRateTrainer),
        clock,
    ))
}

#[derive(Debug, Clone)]
pub struct SeededUser {
    pub name: String,
    pub user_id: UserId,
    pub responses: Vec<String>,
}

/// Register the plan's models, create its templates and record its
/// context samples.
pub async fn seed(engine: &ReminderEngine, plan: &Plan, start: DateTime<Utc>) -> Result<Vec<SeededUser>> {
    for model in &plan.models {
        let registered = engine
            .registry
            .register_model(model.model_type()?, model.parameters.clone(), model.active)
            .await?;
        debug!(model_id = %registered.id, version = registered.version, "Seeded model");
    }

    let mut users = Vec::with_capacity(plan.users.len());
    for user in &plan.users {
        let user_id = user.user_id();
        for reminder in &user.reminders {
            let template = engine
                .catalog
                .create(reminder.to_new_reminder(user_id, start)?)
                .await
                .with_context(|| format!("Failed to create reminder '{}' for {}", reminder.label, user.name))?;
            debug!(user = %user.name, reminder_id = %template.id, label = %template.label, "Seeded reminder");
        }
        for features in &user.context {
            engine.behavior.append_context(user_id, features.clone()).await?;
        }
        users.push(SeededUser {
            name: user.name.clone(),
            user_id,
            responses: user.responses.clone(),
        });
    }

    info!(
        users = users.len(),
        models = plan.models.len(),
        "Seed loaded"
    );
    Ok(users)
}
