//! Runs the external store tool with a controlled environment.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;

use crate::config::Config;
use crate::error::{Result, RigError};
use crate::store::{paths, redirect, town};

/// Subcommand that creates a store rather than operating on one.
const INIT_SUBCOMMAND: &str = "init";

/// Invocation context pinned to one worker directory.
///
/// The resolved store directory and the town root are computed on first
/// use and then reused for the lifetime of the value.
#[derive(Debug)]
pub struct Invoker {
    work_dir: PathBuf,
    store_override: Option<PathBuf>,
    isolated: bool,
    config: Config,
    store_dir: OnceLock<PathBuf>,
    town_root: OnceLock<Option<PathBuf>>,
}

/// Successful tool output.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// How the store location is communicated to the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Targeting {
    /// Set the store env var (and `--db` when isolated).
    Pinned,
    /// Creating the store: no store env var, no `--db`.
    Init,
    /// Let the tool route by prefix itself: no store env var.
    Routed,
}

impl Invoker {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: absolute(work_dir.into()),
            store_override: None,
            isolated: false,
            config: Config::default(),
            store_dir: OnceLock::new(),
            town_root: OnceLock::new(),
        }
    }

    /// Strip inherited tool env vars and force `--db` (test contexts).
    pub fn isolated(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            isolated: true,
            ..Self::new(work_dir)
        }
    }

    /// Target an explicit store directory instead of resolving one.
    pub fn with_store_dir(work_dir: impl Into<PathBuf>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_override: Some(absolute(store_dir.into())),
            ..Self::new(work_dir)
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn set_isolated(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// The store every pinned call targets.
    pub fn store_dir(&self) -> &Path {
        self.store_dir.get_or_init(|| match &self.store_override {
            Some(dir) => dir.clone(),
            None => redirect::resolve_store_dir(&self.work_dir),
        })
    }

    pub fn town_root(&self) -> Option<&Path> {
        self.town_root
            .get_or_init(|| town::find_town_root(&self.work_dir))
            .as_deref()
    }

    /// Caller identity; hidden in isolation mode so tests never inherit one.
    pub fn actor(&self) -> Option<String> {
        if self.isolated {
            return None;
        }
        crate::agent::resolve_actor(&self.config)
    }

    /// A sibling invoker for another store, sharing config and isolation.
    pub fn retarget(&self, store_dir: &Path) -> Self {
        let work_dir = store_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.work_dir.clone());
        Self::with_store_dir(work_dir, store_dir)
            .with_config(self.config.clone())
            .set_isolated(self.isolated)
    }

    /// Run a subcommand against the resolved store.
    pub fn run(&self, args: &[&str]) -> Result<ToolOutput> {
        let targeting = if args.first() == Some(&INIT_SUBCOMMAND) {
            Targeting::Init
        } else {
            Targeting::Pinned
        };
        self.execute(args, targeting)
    }

    /// Run a subcommand without pinning a store, so the tool applies its own
    /// prefix routing.
    pub fn run_with_routing(&self, args: &[&str]) -> Result<ToolOutput> {
        self.execute(args, Targeting::Routed)
    }

    fn full_args(&self, args: &[&str], targeting: Targeting) -> Vec<String> {
        // Global args lead so a configured wrapper (e.g. an interpreter plus
        // script) still sees its own arguments first.
        let mut full = self.config.global_args.clone();
        if self.isolated && targeting == Targeting::Pinned {
            full.push("--db".to_string());
            full.push(
                self.store_dir()
                    .join(&self.config.db_file)
                    .display()
                    .to_string(),
            );
        }
        full.extend(args.iter().map(|a| a.to_string()));
        full
    }

    fn build_command(&self, args: &[&str], targeting: Targeting) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.full_args(args, targeting));
        cmd.current_dir(&self.work_dir);

        if self.isolated {
            for (key, _) in std::env::vars_os() {
                if self.config.is_stripped(&key.to_string_lossy()) {
                    cmd.env_remove(&key);
                }
            }
        }
        cmd.env_remove(&self.config.store_env);
        if targeting == Targeting::Pinned {
            cmd.env(&self.config.store_env, self.store_dir());
        }
        cmd
    }

    fn execute(&self, args: &[&str], targeting: Targeting) -> Result<ToolOutput> {
        let command = self.describe(args);
        tracing::debug!(
            command = %command,
            store = %self.store_dir().display(),
            ?targeting,
            "invoking store tool"
        );

        let output = self
            .build_command(args, targeting)
            .output()
            .map_err(|e| classify_spawn_error(&self.config.program, &self.work_dir, e))?;
        check_output(&command, output)
    }

    fn describe(&self, args: &[&str]) -> String {
        let program = self.config.program.display().to_string();
        std::iter::once(program.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Absolute and cleaned; falls back to lexical cleaning if the cwd is gone.
fn absolute(path: PathBuf) -> PathBuf {
    paths::absolutize(&path).unwrap_or_else(|_| paths::clean(&path))
}

fn classify_spawn_error(program: &Path, work_dir: &Path, err: std::io::Error) -> RigError {
    // A missing cwd also surfaces as NotFound from spawn.
    if err.kind() == ErrorKind::NotFound && work_dir.is_dir() {
        RigError::ToolNotInstalled(program.display().to_string())
    } else {
        RigError::Io(err)
    }
}

fn check_output(command: &str, output: Output) -> Result<ToolOutput> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let status = output
            .status
            .code()
            .map(|c| format!("exit status {c}"))
            .unwrap_or_else(|| "terminated by signal".into());
        return Err(classify_failure(command, &stdout, &stderr, &status));
    }

    // The tool can exit 0 with only a diagnostic; that is not an empty result.
    if stdout.is_empty() && !stderr.trim().is_empty() {
        return Err(classify_failure(command, &stdout, &stderr, ""));
    }

    Ok(ToolOutput { stdout, stderr })
}

/// Substrings of the tool's diagnostics that mean "record does not exist".
const NOT_FOUND_MARKERS: [&str; 3] = ["not found", "Issue not found", "no issue found"];

/// Diagnostic for a create that lost a race with another creator.
const ALREADY_EXISTS_MARKER: &str = "already exists";

/// Translate a failed invocation into the crate's error taxonomy.
///
/// The tool has no structured error codes, so this is the one place that
/// inspects diagnostic text.
pub fn classify_failure(command: &str, stdout: &str, stderr: &str, status: &str) -> RigError {
    let stderr = stderr.trim();

    if NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m)) {
        return RigError::NotFound;
    }

    if stderr.contains(ALREADY_EXISTS_MARKER) {
        return RigError::AlreadyExists {
            command: command.to_string(),
            stderr: stderr.to_string(),
        };
    }

    if stdout.is_empty() && status.is_empty() {
        return RigError::EmptyOutput {
            command: command.to_string(),
            stderr: stderr.to_string(),
        };
    }

    RigError::Command {
        command: command.to_string(),
        stderr: if stderr.is_empty() {
            status.to_string()
        } else {
            stderr.to_string()
        },
        stdout: stdout.to_string(),
    }
}
