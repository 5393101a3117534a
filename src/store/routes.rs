//! Prefix-based routing of record ids to the store that owns them.
//!
//! The town store keeps a `routes.jsonl` registry, one route per line:
//! `{"prefix": "gt-", "path": "gastown/mayor/rig"}`. `path` is relative to
//! the town root; `"."` is the town itself.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::redirect;

/// Registry file name inside the town store.
pub const ROUTES_FILE: &str = "routes.jsonl";

/// Separator between a record prefix and the rest of its id.
pub const PREFIX_SEPARATOR: char = '-';

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub prefix: String,
    pub path: String,
}

impl Route {
    /// Prefix without its trailing separator (`"gt-"` -> `"gt"`).
    pub fn bare_prefix(&self) -> &str {
        self.prefix.trim_end_matches(PREFIX_SEPARATOR)
    }
}

/// Extract the naming prefix of a record id.
///
/// The prefix is everything before the first `-`, and must be 2-3 ASCII
/// alphanumeric characters. Anything else has no routable prefix.
pub fn extract_prefix(record_id: &str) -> Option<&str> {
    let (prefix, rest) = record_id.split_once(PREFIX_SEPARATOR)?;
    if rest.is_empty()
        || !(2..=3).contains(&prefix.len())
        || !prefix.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(prefix)
}

/// Path of the routing registry for a town.
///
/// The town store may itself redirect, so it is resolved first.
pub fn routes_path(town_root: &Path) -> PathBuf {
    redirect::resolve_store_dir(town_root).join(ROUTES_FILE)
}

/// Load all routes for a town. A missing registry is an empty one; blank
/// and malformed lines are skipped.
pub fn load_routes(town_root: &Path) -> Vec<Route> {
    let path = routes_path(town_root);
    let Ok(content) = fs::read_to_string(&path) else {
        return vec![];
    };
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match serde_json::from_str::<Route>(l) {
            Ok(route) => Some(route),
            Err(e) => {
                tracing::debug!(path = %path.display(), line = l, error = %e, "skipping malformed route");
                None
            }
        })
        .collect()
}

/// Find the route owning `prefix` (bare, without separator).
pub fn find_route<'a>(routes: &'a [Route], prefix: &str) -> Option<&'a Route> {
    routes.iter().find(|r| r.bare_prefix() == prefix)
}

/// Directory a route points at (the unit or worktree, not its store).
pub fn route_dir(town_root: &Path, route: &Route) -> PathBuf {
    crate::store::paths::join_clean(town_root, &route.path)
}

/// Store directory that owns `record_id`.
///
/// Returns `current_store` unchanged when the id has no valid prefix, no
/// route matches, or the route resolves to `current_store` itself.
pub fn route_target(town_root: Option<&Path>, record_id: &str, current_store: &Path) -> PathBuf {
    let Some(town_root) = town_root else {
        return current_store.to_path_buf();
    };
    let Some(prefix) = extract_prefix(record_id) else {
        return current_store.to_path_buf();
    };
    let routes = load_routes(town_root);
    let Some(route) = find_route(&routes, prefix) else {
        return current_store.to_path_buf();
    };

    let target = redirect::resolve_store_dir(&route_dir(town_root, route));
    if target == crate::store::paths::clean(current_store) {
        return current_store.to_path_buf();
    }
    tracing::debug!(
        record = record_id,
        prefix,
        target = %target.display(),
        "routing record to another store"
    );
    target
}
