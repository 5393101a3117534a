use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Optional town-level override file, relative to the town root.
pub const CONFIG_FILE: &str = "mayor/rigstate.json";

/// Env var overriding the external tool executable.
pub const TOOL_ENV: &str = "RIGSTATE_TOOL";

/// How the external store tool is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub program: PathBuf,
    pub global_args: Vec<String>,
    pub store_env: String,
    pub actor_env: String,
    pub db_file: String,
    pub isolation_strip: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            program: PathBuf::from("bd"),
            global_args: vec!["--allow-stale".into()],
            store_env: "BEADS_DIR".into(),
            actor_env: "BD_ACTOR".into(),
            db_file: "beads.db".into(),
            isolation_strip: vec![
                "BD_ACTOR".into(),
                "BEADS_".into(),
                "GT_ROOT".into(),
                "HOME".into(),
            ],
        }
    }
}

impl Config {
    /// Defaults, then `<town>/mayor/rigstate.json` if present, then env overrides.
    pub fn load(town_root: Option<&Path>) -> Result<Self> {
        let mut config = match town_root.map(|t| t.join(CONFIG_FILE)) {
            Some(path) if path.is_file() => serde_json::from_str(&fs::read_to_string(&path)?)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(program) = std::env::var_os(TOOL_ENV).filter(|v| !v.is_empty()) {
            self.program = PathBuf::from(program);
        }
    }

    /// Whether an env var must be dropped in isolation mode.
    ///
    /// Entries ending in `_` match as prefixes; others match the exact name.
    pub fn is_stripped(&self, key: &str) -> bool {
        self.isolation_strip.iter().any(|p| {
            if p.ends_with('_') {
                key.starts_with(p.as_str())
            } else {
                key == p
            }
        })
    }
}
