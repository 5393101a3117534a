use std::path::{Path, PathBuf};

use crate::error::{Result, RigError};
use crate::store::paths;

/// Primary town marker, relative to the town root.
pub const TOWN_MARKER: &str = "mayor/town.json";

/// Secondary marker: a bare `mayor/` directory.
pub const TOWN_MARKER_DIR: &str = "mayor";

/// Walk up from `start` to find the town root.
///
/// The nearest ancestor holding `mayor/town.json` wins. If no ancestor has
/// the primary marker, the nearest one with a `mayor/` directory is used.
pub fn find_town_root(start: &Path) -> Option<PathBuf> {
    let mut dir = paths::absolutize(start).ok()?;
    let mut secondary: Option<PathBuf> = None;
    loop {
        if dir.join(TOWN_MARKER).is_file() {
            return Some(dir);
        }
        if secondary.is_none() && dir.join(TOWN_MARKER_DIR).is_dir() {
            secondary = Some(dir.clone());
        }
        if !dir.pop() {
            return secondary;
        }
    }
}

/// Like [`find_town_root`], but a missing town is an error.
pub fn require_town_root(start: &Path) -> Result<PathBuf> {
    find_town_root(start).ok_or_else(|| RigError::TownNotFound(start.to_path_buf()))
}
