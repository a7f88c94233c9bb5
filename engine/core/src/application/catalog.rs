// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::error::EngineError;
use crate::domain::clock::Clock;
use crate::domain::events::ReminderEvent;
use crate::domain::repository::ReminderRepository;
use crate::domain::reminder::{NewReminder, ReminderId, ReminderTemplate, TemplatePatch, UserId};
use crate::infrastructure::event_bus::EventBus;

pub const MAX_PAGE_SIZE: usize = 100;

/// Owns reminder templates. Deactivation flips a flag; templates are never
/// removed.
pub struct ReminderCatalog {
    repository: Arc<dyn ReminderRepository>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl ReminderCatalog {
    pub fn new(repository: Arc<dyn ReminderRepository>, clock: Arc<dyn Clock>, event_bus: EventBus) -> Self {
        Self {
            repository,
            clock,
            event_bus,
        }
    }

    pub async fn create(&self, input: NewReminder) -> Result<ReminderTemplate, EngineError> {
        let template = ReminderTemplate::new(input, self.clock.now())?;
        self.repository.save(&template).await?;

        info!(
            reminder_id = %template.id,
            user_id = %template.user_id,
            priority = %template.priority,
            "Reminder template created"
        );
        self.event_bus.publish(ReminderEvent::TemplateCreated {
            reminder_id: template.id,
            user_id: template.user_id,
            created_at: template.created_at,
        });
        Ok(template)
    }

    pub async fn update(&self, id: ReminderId, patch: TemplatePatch) -> Result<ReminderTemplate, EngineError> {
        let now = self.clock.now();
        let template = self
            .repository
            .update_with(id, &|t: &mut ReminderTemplate| t.apply(patch.clone(), now))
            .await?;

        debug!(reminder_id = %id, "Reminder template updated");
        self.event_bus.publish(ReminderEvent::TemplateUpdated {
            reminder_id: id,
            priority: template.priority,
            updated_at: template.updated_at,
        });
        Ok(template)
    }

    /// Idempotent; the event is only published on the first call.
    pub async fn deactivate(&self, id: ReminderId) -> Result<ReminderTemplate, EngineError> {
        let now = self.clock.now();
        let changed = AtomicBool::new(false);
        let template = self
            .repository
            .update_with(id, &|t: &mut ReminderTemplate| {
                changed.store(t.deactivate(now), Ordering::SeqCst);
                Ok(())
            })
            .await?;

        if changed.load(Ordering::SeqCst) {
            info!(reminder_id = %id, "Reminder template deactivated");
            self.event_bus.publish(ReminderEvent::TemplateDeactivated {
                reminder_id: id,
                deactivated_at: now,
            });
        }
        Ok(template)
    }

    pub async fn get(&self, id: ReminderId) -> Result<ReminderTemplate, EngineError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("reminder template", id))
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ReminderTemplate>, EngineError> {
        Ok(self.repository.find_by_user(user_id).await?)
    }

    /// Window of [`list_for_user`](Self::list_for_user) in creation order.
    /// `limit` is capped at [`MAX_PAGE_SIZE`].
    pub async fn list_page(
        &self,
        user_id: UserId,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<ReminderTemplate>, EngineError> {
        Ok(self
            .repository
            .find_by_user(user_id)
            .await?
            .into_iter()
            .skip(skip)
            .take(limit.min(MAX_PAGE_SIZE))
            .collect())
    }
}
