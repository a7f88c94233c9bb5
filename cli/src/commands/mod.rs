// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Nudge CLI

pub mod config;
pub mod run;
pub mod simulate;

pub use self::config::ConfigCommand;
pub use self::run::RunArgs;
pub use self::simulate::SimulateArgs;
