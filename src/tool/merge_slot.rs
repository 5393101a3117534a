//! Client for the single merge slot that serializes merges across workers.
//!
//! The slot is one record in the store, created on first use. At most one
//! holder owns it; others may queue as waiters. Atomicity is the store
//! tool's job: every method here issues a single tool command (ensure
//! issues at most two) and never sleeps or retries.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RigError};
use crate::tool::invoker::Invoker;

/// Value of [`SlotStatus::error`] when the slot has never been created.
pub const SLOT_NOT_FOUND: &str = "not found";

const SUBCOMMAND: &str = "merge-slot";

/// Slot state as reported by the store tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waiters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SlotStatus {
    /// Sentinel for a slot that does not exist yet.
    pub fn not_found() -> Self {
        Self {
            error: Some(SLOT_NOT_FOUND.into()),
            ..Self::default()
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.error.as_deref() == Some(SLOT_NOT_FOUND)
    }

    /// Whether `who` currently holds the slot.
    pub fn is_held_by(&self, who: &str) -> bool {
        !self.available && self.holder.as_deref() == Some(who)
    }

    /// Enforce `available` iff no holder. A recorded holder wins over the
    /// flag. Error payloads are left alone.
    fn normalized(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.holder.as_deref().is_some_and(|h| h.trim().is_empty()) {
            self.holder = None;
        }
        if self.available == self.holder.is_some() {
            tracing::warn!(
                id = %self.id,
                available = self.available,
                holder = ?self.holder,
                "inconsistent merge slot status; trusting holder"
            );
            self.available = self.holder.is_none();
        }
        self
    }
}

/// Result of an acquire attempt. `holder` is the requested identity, or the
/// recorded holder when an anonymous request succeeded (empty otherwise).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquireOutcome {
    pub acquired: bool,
    pub holder: String,
    pub status: SlotStatus,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Released {
    #[serde(default)]
    released: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct MergeSlot<'a> {
    invoker: &'a Invoker,
}

impl<'a> MergeSlot<'a> {
    pub fn new(invoker: &'a Invoker) -> Self {
        Self { invoker }
    }

    /// Create the slot. An "already exists" answer from a racing creator is
    /// success; the id is then read back with [`MergeSlot::check`].
    pub fn create(&self) -> Result<String> {
        match self.invoker.run(&[SUBCOMMAND, "create", "--json"]) {
            Ok(out) => {
                let created: Created = parse("merge-slot create", &out.stdout)?;
                Ok(created.id)
            }
            Err(RigError::AlreadyExists { .. }) => {
                tracing::debug!("merge slot created concurrently");
                Ok(self.check()?.id)
            }
            Err(e) => Err(e),
        }
    }

    /// Read the slot. A missing slot is reported as [`SlotStatus::not_found`].
    pub fn check(&self) -> Result<SlotStatus> {
        match self.invoker.run(&[SUBCOMMAND, "check", "--json"]) {
            Ok(out) => parse_status("merge-slot check", &out.stdout),
            Err(RigError::NotFound) => Ok(SlotStatus::not_found()),
            Err(e) => Err(e),
        }
    }

    /// Create the slot if a check says it is missing. Returns the slot id.
    pub fn ensure_exists(&self) -> Result<String> {
        let status = self.check()?;
        if status.is_not_found() {
            return self.create();
        }
        Ok(status.id)
    }

    /// Try to take the slot for `holder` (the caller's identity when `None`
    /// or empty). With `add_waiter`, a busy slot queues the holder. Never
    /// blocks: a busy slot is reported with `acquired == false`.
    pub fn acquire(&self, holder: Option<&str>, add_waiter: bool) -> Result<AcquireOutcome> {
        let holder = holder
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .or_else(|| self.invoker.actor());

        let holder_arg = holder.as_ref().map(|h| format!("--holder={h}"));
        let mut args = vec![SUBCOMMAND, "acquire", "--json"];
        if let Some(arg) = &holder_arg {
            args.push(arg);
        }
        if add_waiter {
            args.push("--wait");
        }

        let (status, exited_ok) = match self.invoker.run(&args) {
            Ok(out) => (parse_status("merge-slot acquire", &out.stdout)?, true),
            // A busy slot fails the command but still reports its state.
            Err(e) => match e.stdout().and_then(|s| serde_json::from_str::<SlotStatus>(s).ok()) {
                Some(status) => (status.normalized(), false),
                None => return Err(e),
            },
        };

        let acquired = exited_ok
            && status.error.is_none()
            && match &holder {
                Some(h) => status.is_held_by(h),
                None => !status.available,
            };
        let holder = match holder {
            Some(h) => h,
            None if acquired => status.holder.clone().unwrap_or_default(),
            None => String::new(),
        };
        Ok(AcquireOutcome {
            acquired,
            holder,
            status,
        })
    }

    /// Release the slot. With `holder`, the tool refuses unless it matches
    /// the recorded holder. Waking the next waiter is not done here.
    pub fn release(&self, holder: Option<&str>) -> Result<()> {
        let holder_arg = holder
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| format!("--holder={h}"));
        let mut args = vec![SUBCOMMAND, "release", "--json"];
        if let Some(arg) = &holder_arg {
            args.push(arg);
        }

        let out = match self.invoker.run(&args) {
            Ok(out) => out.stdout,
            Err(e) => match e.stdout() {
                Some(stdout) => stdout.to_string(),
                None => return Err(e),
            },
        };

        let released: Released = parse("merge-slot release", &out)?;
        if !released.released {
            return Err(RigError::SlotReleaseRefused(
                released
                    .error
                    .unwrap_or_else(|| "slot was not released".into()),
            ));
        }
        Ok(())
    }
}

fn parse_status(command: &str, stdout: &str) -> Result<SlotStatus> {
    parse::<SlotStatus>(command, stdout).map(SlotStatus::normalized)
}

fn parse<T: serde::de::DeserializeOwned>(command: &str, stdout: &str) -> Result<T> {
    serde_json::from_str(stdout).map_err(|source| RigError::Parse {
        command: command.into(),
        source,
    })
}
