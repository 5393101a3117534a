use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RigError {
    #[error("{0} not installed or not on PATH")]
    ToolNotInstalled(String),

    #[error("record not found")]
    NotFound,

    #[error("not inside a town (no mayor/town.json above {0})")]
    TownNotFound(PathBuf),

    #[error("worktree {0} is not inside town root {1}")]
    WorktreeOutsideTown(PathBuf, PathBuf),

    #[error("worktree path must be at least 2 levels deep from town root, got '{0}'")]
    WorktreeTooShallow(String),

    #[error("refusing to create redirect in canonical store location ({0})")]
    CanonicalLocation(String),

    #[error("no store found at {0} or {1}")]
    NoStoreFound(PathBuf, PathBuf),

    #[error("invalid record prefix in '{0}'")]
    InvalidPrefix(String),

    #[error("{command}: {stderr}")]
    Command {
        command: String,
        stderr: String,
        stdout: String,
    },

    #[error("{command}: already exists: {stderr}")]
    AlreadyExists { command: String, stderr: String },

    #[error("{command}: command produced no output: {stderr}")]
    EmptyOutput { command: String, stderr: String },

    #[error("parsing {command} output: {source}")]
    Parse {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("merge slot release refused: {0}")]
    SlotReleaseRefused(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RigError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ToolNotInstalled(_) => "tool_not_installed",
            Self::NotFound => "not_found",
            Self::TownNotFound(_) => "town_not_found",
            Self::WorktreeOutsideTown(_, _) => "worktree_outside_town",
            Self::WorktreeTooShallow(_) => "worktree_too_shallow",
            Self::CanonicalLocation(_) => "canonical_location",
            Self::NoStoreFound(_, _) => "no_store_found",
            Self::InvalidPrefix(_) => "invalid_prefix",
            Self::Command { .. } => "command_failed",
            Self::AlreadyExists { .. } => "already_exists",
            Self::EmptyOutput { .. } => "empty_output",
            Self::Parse { .. } => "parse_error",
            Self::SlotReleaseRefused(_) => "slot_release_refused",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    /// True for the recoverable "record does not exist" class.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Raw stdout carried by a failed invocation, if any.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::Command { stdout, .. } if !stdout.trim().is_empty() => Some(stdout),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RigError>;
