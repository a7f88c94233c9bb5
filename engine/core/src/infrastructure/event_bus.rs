// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - Pub/Sub for Reminder Events
//
// In-memory fan-out over a tokio broadcast channel. The CLI and tests
// subscribe to watch scheduling, dispatch and feedback as they happen.
// Events are not persisted; a slow receiver drops the oldest entries.

use crate::domain::events::ReminderEvent;
use crate::domain::reminder::UserId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<ReminderEvent>>,
}

impl EventBus {
    /// `capacity` is how many events are buffered before old ones are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }

    pub fn publish(&self, event: ReminderEvent) {
        debug!(?event, "Publishing reminder event");
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Events carrying the given user id. Events without a user are skipped.
    pub fn subscribe_user(&self, user_id: UserId) -> UserEventReceiver {
        UserEventReceiver {
            receiver: self.sender.subscribe(),
            user_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(err: broadcast::error::RecvError) -> EventBusError {
    match err {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<ReminderEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<ReminderEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<ReminderEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Drain everything currently buffered.
    pub fn drain(&mut self) -> Vec<ReminderEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

pub struct UserEventReceiver {
    receiver: broadcast::Receiver<ReminderEvent>,
    user_id: UserId,
}

impl UserEventReceiver {
    pub async fn recv(&mut self) -> Result<ReminderEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.user_id() == Some(self.user_id) {
                return Ok(event);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
