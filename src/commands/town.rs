use std::path::Path;

use colored::Colorize;
use serde_json::json;

use crate::error::Result;
use crate::output::{Format, display_path};
use crate::store::{paths, town};

pub fn run(dir: &Path, format: Format) -> Result<()> {
    let dir = paths::absolutize(dir)?;
    let root = town::require_town_root(&dir)?;

    match format {
        Format::Json => println!("{}", json!({ "town_root": display_path(&root) })),
        Format::Pretty => println!("{} {}", "Town:".green().bold(), display_path(&root).cyan()),
        Format::Minimal => println!("{}", display_path(&root)),
    }
    Ok(())
}
