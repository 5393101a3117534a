use std::path::Path;

use clap::ValueEnum;
use colored::Colorize;

use crate::error::Result;
use crate::tool::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}

pub fn print_record(record: &Record, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(record)?),
        Format::Pretty => {
            println!(
                "[{}] {} ({})",
                record.id.cyan(),
                record.title.bold(),
                record.status
            );
            if let Some(ref assignee) = record.assignee {
                println!("  assignee: {}", assignee);
            }
            if !record.labels.is_empty() {
                println!("  labels: {}", record.labels.join(", "));
            }
        }
        Format::Minimal => {
            let assignee = record.assignee.as_deref().unwrap_or("-");
            println!(
                "{} {:12} {:10} {}",
                record.id,
                truncate_title(&record.title, 12),
                record.status,
                assignee
            );
        }
    }
    Ok(())
}

pub fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() > max_len {
        let truncated: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        title.to_string()
    }
}
