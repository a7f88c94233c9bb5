// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `nudge run`: long-running engine on the wall clock.
//!
//! Deliveries go through the logging channel. The process schedules every
//! user on a fixed interval, sweeps due occurrences on the dispatch interval
//! from the config, and stops on Ctrl-C.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nudge_core::application::Scheduler;
use nudge_core::domain::clock::SystemClock;
use nudge_core::infrastructure::event_bus::{EventBusError, EventReceiver};

use crate::plan::Plan;
use crate::wiring;

#[derive(Args)]
pub struct RunArgs {
    /// Plan file whose models and reminders are loaded at startup
    #[arg(short, long, value_name = "FILE")]
    pub seed: Option<PathBuf>,

    /// Interval between scheduling passes
    #[arg(long, default_value = "5m", value_parser = humantime::parse_duration)]
    pub schedule_every: Duration,
}

pub async fn execute(args: RunArgs, config_override: Option<PathBuf>) -> Result<()> {
    let engine = wiring::build_engine(config_override, Arc::new(SystemClock))?;

    if let Some(path) = &args.seed {
        let plan = Plan::from_file(path)?;
        wiring::seed(&engine, &plan, Utc::now()).await?;
    }

    let cancellation = CancellationToken::new();

    let events = tokio::spawn(log_events(engine.event_bus.subscribe(), cancellation.clone()));

    let dispatcher = engine.dispatcher.clone();
    let dispatch_interval = engine.config.dispatch.interval;
    let dispatch_token = cancellation.clone();
    let dispatch = tokio::spawn(async move { dispatcher.run(dispatch_interval, dispatch_token).await });

    let scheduling = tokio::spawn(schedule_loop(
        engine.scheduler.clone(),
        args.schedule_every,
        cancellation.clone(),
    ));

    info!(
        schedule_every = %humantime::format_duration(args.schedule_every),
        dispatch_every = %humantime::format_duration(dispatch_interval),
        "Engine running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    cancellation.cancel();

    for (name, task) in [("dispatcher", dispatch), ("scheduler", scheduling), ("event log", events)] {
        if let Err(e) = task.await {
            warn!("{} task ended abnormally: {}", name, e);
        }
    }

    info!("Engine stopped");
    Ok(())
}

async fn schedule_loop(scheduler: Arc<Scheduler>, period: Duration, cancellation: CancellationToken) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match scheduler.schedule_all().await {
                    Ok(results) => {
                        let mut scheduled = 0;
                        for (user_id, result) in results {
                            match result {
                                Ok(report) => scheduled += report.scheduled.len(),
                                Err(e) => warn!(user_id = %user_id, "Scheduling pass failed: {}", e),
                            }
                        }
                        debug!(scheduled, "Scheduling round completed");
                    }
                    Err(e) => warn!("Scheduling round failed: {}", e),
                }
            }
            _ = cancellation.cancelled() => break,
        }
    }
}

async fn log_events(mut receiver: EventReceiver, cancellation: CancellationToken) {
    loop {
        tokio::select! {
            event = receiver.recv() => match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(target: "nudge::events", "{}", json),
                    Err(e) => warn!("Failed to encode event: {}", e),
                },
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            },
            _ = cancellation.cancelled() => break,
        }
    }
}
