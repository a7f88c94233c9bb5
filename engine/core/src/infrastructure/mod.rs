// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod channels;
pub mod event_bus;
pub mod inference;
pub mod repositories;
