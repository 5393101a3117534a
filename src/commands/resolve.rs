use std::path::Path;

use colored::Colorize;
use serde_json::json;

use crate::error::Result;
use crate::output::{Format, display_path};
use crate::store::paths;
use crate::store::redirect::{self, Stop};

pub fn run(dir: &Path, format: Format) -> Result<()> {
    let dir = paths::absolutize(dir)?;
    let resolution = redirect::resolve(&dir);

    match format {
        Format::Json => println!(
            "{}",
            json!({
                "work_dir": display_path(&dir),
                "store_dir": display_path(&resolution.store_dir),
                "hops": resolution.hops,
                "stop": resolution.stop.to_string(),
            })
        ),
        Format::Pretty => {
            println!(
                "{} {}",
                "Store:".green().bold(),
                display_path(&resolution.store_dir).cyan()
            );
            if resolution.hops > 0 {
                println!("  {}", format!("{} redirect hop(s)", resolution.hops).dimmed());
            }
            if resolution.stop != Stop::Authoritative {
                println!("  {} {}", "stopped:".yellow(), resolution.stop);
            }
        }
        Format::Minimal => println!("{}", display_path(&resolution.store_dir)),
    }
    Ok(())
}
