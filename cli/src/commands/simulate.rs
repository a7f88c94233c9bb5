// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `nudge simulate`: replay a plan against a virtual clock.
//!
//! Each round schedules every user, advances the clock by the plan's step,
//! dispatches whatever fell due, answers deliveries from the users' scripted
//! responses and finally expires unanswered deliveries (when a TTL is set).

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use nudge_core::application::ReminderEngine;
use nudge_core::domain::clock::ManualClock;
use nudge_core::domain::repository::OccurrenceRepository;
use nudge_core::{ModelType, OccurrenceStatus, UserId};

use crate::plan::Plan;
use crate::wiring::{self, SeededUser};

#[derive(Args)]
pub struct SimulateArgs {
    /// Plan file describing users, reminders, models and responses
    #[arg(short, long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Override the number of rounds in the plan
    #[arg(long)]
    pub rounds: Option<u32>,
}

#[derive(Debug, Default)]
struct RoundTally {
    scheduled: usize,
    skipped: usize,
    failed_users: usize,
    dispatched: usize,
    answered: usize,
    expired: usize,
}

pub async fn execute(args: SimulateArgs, config_override: Option<PathBuf>) -> Result<()> {
    let plan = Plan::from_file(&args.plan)?;
    let rounds = args.rounds.unwrap_or(plan.rounds);
    let step = chrono::Duration::from_std(plan.step).context("Plan step is out of range")?;
    let start = plan.start.unwrap_or_else(Utc::now);

    let clock = Arc::new(ManualClock::new(start));
    let engine = wiring::build_engine(config_override, clock.clone())?;
    let users = wiring::seed(&engine, &plan, start).await?;

    println!(
        "{} {} users, {} rounds of {}",
        "Simulating".bold(),
        users.len(),
        rounds,
        humantime::format_duration(plan.step)
    );
    println!();

    let mut cursors: HashMap<UserId, usize> = HashMap::new();
    for round in 1..=rounds {
        let mut tally = RoundTally::default();

        for (user_id, result) in engine.scheduler.schedule_all().await? {
            match result {
                Ok(report) => {
                    tally.scheduled += report.scheduled.len();
                    tally.skipped += report.skipped_pending + report.skipped_conflicts + report.failed;
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Scheduling pass failed");
                    tally.failed_users += 1;
                }
            }
        }

        clock.advance(step);
        tally.dispatched = engine.dispatcher.trigger_pending_reminders().await?;

        for user in &users {
            tally.answered += answer_deliveries(&engine, user, &mut cursors, round).await?;
        }

        tally.expired = engine.dispatcher.expire_unanswered().await?;

        println!(
            "  {} {}  scheduled {}  skipped {}  dispatched {}  answered {}  expired {}{}",
            "round".dimmed(),
            format!("{:>2}", round).bold(),
            tally.scheduled.to_string().green(),
            tally.skipped.to_string().yellow(),
            tally.dispatched,
            tally.answered,
            tally.expired,
            if tally.failed_users > 0 {
                format!("  failed users {}", tally.failed_users).red().to_string()
            } else {
                String::new()
            }
        );
    }
    println!();

    if plan.retrain {
        let user_ids = users.iter().map(|u| u.user_id).collect();
        let outcome = engine.retraining.spawn(ModelType::Scheduling, user_ids, true).join().await;
        println!("{} {}", "Retraining:".bold(), outcome.label());
        println!();
    }

    print_summary(&engine, &users).await
}

/// Apply the user's next scripted responses to their open deliveries, oldest
/// first. Deliveries beyond the script stay SENT.
async fn answer_deliveries(
    engine: &ReminderEngine,
    user: &SeededUser,
    cursors: &mut HashMap<UserId, usize>,
    round: u32,
) -> Result<usize> {
    let mut sent: Vec<_> = OccurrenceRepository::find_by_user(&engine.store, user.user_id)
        .await?
        .into_iter()
        .filter(|o| o.status == OccurrenceStatus::Sent)
        .collect();
    sent.sort_by_key(|o| o.scheduled_time);

    let cursor = cursors.entry(user.user_id).or_insert(0);
    let mut answered = 0;
    for occurrence in sent {
        let Some(kind) = user.responses.get(*cursor) else {
            break;
        };
        *cursor += 1;
        engine
            .recorder
            .record_interaction_str(occurrence.id, kind, json!({ "round": round }))
            .await
            .with_context(|| format!("Failed to record '{}' for {}", kind, user.name))?;
        answered += 1;
    }
    Ok(answered)
}

async fn print_summary(engine: &ReminderEngine, users: &[SeededUser]) -> Result<()> {
    println!("{}", "Occurrences:".bold());
    for status in [
        OccurrenceStatus::Scheduled,
        OccurrenceStatus::Sent,
        OccurrenceStatus::Completed,
        OccurrenceStatus::Dismissed,
        OccurrenceStatus::Expired,
    ] {
        println!("  {:<10} {}", status.to_string(), engine.store.count_by_status(status));
    }
    println!();

    println!("{}", "Reminders:".bold());
    for user in users {
        println!("  {}", user.name.cyan());
        for template in engine.catalog.list_for_user(user.user_id).await? {
            let state = if template.is_active {
                "active".green()
            } else {
                "inactive".dimmed()
            };
            println!("    {:<24} priority {:>2}  {}", template.label, template.priority.to_string(), state);
        }
    }

    if let Some(model) = engine.registry.get_active_model(ModelType::Scheduling).await? {
        println!();
        println!(
            "{} v{} {}",
            "Active scheduling model:".bold(),
            model.version,
            serde_json::to_string(&model.parameters)?.dimmed()
        );
    }
    Ok(())
}
