pub mod provision;
pub mod resolve;
pub mod route;
pub mod show;
pub mod slot;
pub mod town;

use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::store::town::find_town_root;
use crate::tool::Invoker;

/// Invoker for `dir`, configured from the enclosing town when there is one.
pub(crate) fn open_invoker(dir: &Path, isolated: bool) -> Result<Invoker> {
    let town = find_town_root(dir);
    let config = Config::load(town.as_deref())?;
    Ok(Invoker::new(dir).with_config(config).set_isolated(isolated))
}
