// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # `nudge-core` - Adaptive Reminder Scheduling Engine
//!
//! Decides when and through which channel a recurring personal reminder is
//! delivered, learns from the user's responses, and drives each delivery
//! through its lifecycle.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | Templates, occurrences, interactions, models, repository traits |
//! | [`application`] | Application | Catalog, scheduler, dispatcher, interaction recorder, registry |
//! | [`infrastructure`] | Infrastructure | In-memory store, event bus, channels, inference backends |
//!
//! ## Lifecycle
//!
//! ```text
//! SCHEDULED ──(Dispatcher)──▶ SENT ──(InteractionRecorder)──▶ COMPLETED | DISMISSED
//!                               └──(expiry sweep, opt-in)───▶ EXPIRED
//! ```

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
