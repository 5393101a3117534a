use std::path::Path;

use colored::Colorize;
use serde_json::json;

use crate::error::{Result, RigError};
use crate::output::{Format, display_path};
use crate::store::{paths, redirect, routes, town};

pub fn run(dir: &Path, id: &str, format: Format) -> Result<()> {
    let dir = paths::absolutize(dir)?;
    let prefix = routes::extract_prefix(id).ok_or_else(|| RigError::InvalidPrefix(id.into()))?;
    let root = town::require_town_root(&dir)?;

    let current = redirect::resolve_store_dir(&dir);
    let target = routes::route_target(Some(&root), id, &current);
    let routed = target != current;

    match format {
        Format::Json => println!(
            "{}",
            json!({
                "id": id,
                "prefix": prefix,
                "store_dir": display_path(&target),
                "routed": routed,
            })
        ),
        Format::Pretty => {
            let label = if routed { "Routed:".green() } else { "Local:".normal() };
            println!(
                "{} {} -> {}",
                label.bold(),
                id.cyan(),
                display_path(&target)
            );
        }
        Format::Minimal => println!("{}", display_path(&target)),
    }
    Ok(())
}
