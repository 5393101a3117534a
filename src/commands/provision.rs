use std::path::Path;

use colored::Colorize;
use serde_json::json;

use crate::error::Result;
use crate::output::{Format, display_path};
use crate::store::{paths, provision, town};

pub fn run(worktree: &Path, town_root: Option<&Path>, format: Format) -> Result<()> {
    let worktree = paths::absolutize(worktree)?;
    let town_root = match town_root {
        Some(t) => paths::absolutize(t)?,
        None => town::require_town_root(&worktree)?,
    };

    let done = provision::provision(&town_root, &worktree)?;

    match format {
        Format::Json => println!(
            "{}",
            json!({
                "worktree": display_path(&worktree),
                "redirect": display_path(&done.redirect_path),
                "target": done.target,
                "canonical_fallback": done.used_canonical_fallback,
            })
        ),
        Format::Pretty => {
            println!(
                "{} {} -> {}",
                "Provisioned".green().bold(),
                display_path(&worktree),
                done.target.cyan()
            );
            if done.used_canonical_fallback {
                println!("  {}", "using mayor/rig store".dimmed());
            }
        }
        Format::Minimal => println!("{}", done.target),
    }
    Ok(())
}
