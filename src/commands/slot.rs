use std::path::Path;

use colored::Colorize;
use serde_json::json;

use crate::agent;
use crate::error::Result;
use crate::output::Format;
use crate::tool::{AcquireOutcome, MergeSlot, SlotStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotAction {
    Check,
    Create,
    Ensure,
    Acquire { holder: Option<String>, wait: bool },
    Release { holder: Option<String> },
}

pub fn run(dir: &Path, action: SlotAction, isolated: bool, format: Format) -> Result<()> {
    let invoker = super::open_invoker(dir, isolated)?;
    let slot = MergeSlot::new(&invoker);

    match action {
        SlotAction::Check => print_status(&slot.check()?, format),
        SlotAction::Create => print_id("created", &slot.create()?, format),
        SlotAction::Ensure => print_id("ready", &slot.ensure_exists()?, format),
        SlotAction::Acquire { holder, wait } => {
            // The CLI always names a holder so the result is attributable.
            let holder = holder
                .filter(|h| !h.trim().is_empty())
                .or_else(|| invoker.actor())
                .unwrap_or_else(agent::generated_fallback);
            print_acquire(&slot.acquire(Some(&holder), wait)?, format);
        }
        SlotAction::Release { holder } => {
            slot.release(holder.as_deref())?;
            match format {
                Format::Json => println!("{}", json!({ "released": true })),
                Format::Pretty => println!("{}", "Released merge slot".green().bold()),
                Format::Minimal => println!("released"),
            }
        }
    }
    Ok(())
}

fn print_status(status: &SlotStatus, format: Format) {
    match format {
        Format::Json => println!("{}", json!(status)),
        Format::Pretty => {
            if status.is_not_found() {
                println!("{}", "Merge slot not created".yellow());
                return;
            }
            let state = if status.available {
                "available".green()
            } else {
                "held".red()
            };
            println!("{} {} ({})", "Slot".bold(), status.id.cyan(), state);
            if let Some(ref holder) = status.holder {
                println!("  holder: {}", holder);
            }
            if !status.waiters.is_empty() {
                println!("  waiters: {}", status.waiters.join(", "));
            }
        }
        Format::Minimal => {
            if status.is_not_found() {
                println!("missing");
            } else if status.available {
                println!("available");
            } else {
                println!("held:{}", status.holder.as_deref().unwrap_or("-"));
            }
        }
    }
}

fn print_id(state: &str, id: &str, format: Format) {
    match format {
        Format::Json => println!("{}", json!({ "id": id, "state": state })),
        Format::Pretty => println!("{} {}", "Merge slot".bold(), id.cyan()),
        Format::Minimal => println!("{id}"),
    }
}

fn print_acquire(outcome: &AcquireOutcome, format: Format) {
    match format {
        Format::Json => println!("{}", json!(outcome)),
        Format::Pretty => {
            if outcome.acquired {
                println!(
                    "{} merge slot for {}",
                    "Acquired".green().bold(),
                    outcome.holder.cyan()
                );
            } else {
                let by = outcome.status.holder.as_deref().unwrap_or("unknown");
                println!("{} held by {}", "Busy:".yellow().bold(), by);
                if outcome.status.waiters.iter().any(|w| w == &outcome.holder) {
                    println!("  {}", "queued as waiter".dimmed());
                }
            }
        }
        Format::Minimal => println!("{}", if outcome.acquired { "acquired" } else { "busy" }),
    }
}
