use serde::{Deserialize, Serialize};

use crate::error::{Result, RigError};
use crate::store::routes;
use crate::tool::invoker::Invoker;

/// The subset of a store record this crate reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// Typed access to records, with cross-store routing.
pub struct RecordClient<'a> {
    invoker: &'a Invoker,
}

impl<'a> RecordClient<'a> {
    pub fn new(invoker: &'a Invoker) -> Self {
        Self { invoker }
    }

    /// Create the store with the given record prefix.
    pub fn init(&self, prefix: &str) -> Result<()> {
        self.invoker.run(&["init", "--prefix", prefix, "--quiet"])?;
        Ok(())
    }

    /// Whether the resolved store directory exists.
    pub fn is_store(&self) -> bool {
        self.invoker.store_dir().is_dir()
    }

    /// Fetch one record, re-targeting to the store that owns its prefix.
    pub fn show(&self, id: &str) -> Result<Record> {
        let current = self.invoker.store_dir();
        let target = routes::route_target(self.invoker.town_root(), id, current);
        if target != current {
            let routed = self.invoker.retarget(&target);
            return RecordClient::new(&routed).show_local(id);
        }
        self.show_local(id)
    }

    fn show_local(&self, id: &str) -> Result<Record> {
        let out = self.invoker.run(&["show", id, "--json"])?;
        // `show --json` answers with a one-element array.
        let mut records: Vec<Record> =
            serde_json::from_str(&out.stdout).map_err(|source| RigError::Parse {
                command: "show".into(),
                source,
            })?;
        if records.is_empty() {
            return Err(RigError::NotFound);
        }
        Ok(records.swap_remove(0))
    }
}
