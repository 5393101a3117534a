//! Store-location resolution through `redirect` indirection files.
//!
//! A worktree's store lives at `<workdir>/.state`. If that directory holds a
//! `redirect` file, its single line names the authoritative store instead.
//! The first hop is read relative to the worktree; every later hop is read
//! relative to the parent of the store holding the file.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::store::paths;

/// Conventional store subdirectory inside a worktree or unit root.
pub const STORE_DIR_NAME: &str = ".state";

/// Indirection file name inside a store directory.
pub const REDIRECT_FILE: &str = "redirect";

/// Upper bound on redirect hops followed from a worktree.
pub const MAX_REDIRECT_DEPTH: usize = 3;

/// Outcome of a resolution, with the diagnostics gathered along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub store_dir: PathBuf,
    pub hops: usize,
    pub stop: Stop,
}

/// Why resolution stopped where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Reached a store with no (or a blank) redirect.
    Authoritative,
    /// The worktree's own redirect pointed back at itself and was removed.
    SelfRedirectRemoved,
    /// A later hop would revisit a store already on the chain.
    Cycle,
    /// The hop budget ran out while another redirect was still pending.
    TooDeep,
}

impl std::fmt::Display for Stop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stop::Authoritative => "authoritative",
            Stop::SelfRedirectRemoved => "self_redirect_removed",
            Stop::Cycle => "cycle",
            Stop::TooDeep => "too_deep",
        })
    }
}

/// Path of the store directory conventionally owned by `work_dir`.
pub fn local_store_dir(work_dir: &Path) -> PathBuf {
    work_dir.join(STORE_DIR_NAME)
}

/// Read a store's redirect target.
///
/// A missing, unreadable, or whitespace-only file all mean "no redirect".
pub fn read_redirect(store_dir: &Path) -> Option<String> {
    let content = fs::read_to_string(store_dir.join(REDIRECT_FILE)).ok()?;
    let target = content.lines().next().unwrap_or("").trim();
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

/// Whether a store carries a non-blank redirect.
pub fn has_redirect(store_dir: &Path) -> bool {
    read_redirect(store_dir).is_some()
}

/// Resolve the authoritative store directory for `work_dir`.
pub fn resolve_store_dir(work_dir: &Path) -> PathBuf {
    resolve(work_dir).store_dir
}

/// Resolve with full detail. See [`resolve_store_dir`].
pub fn resolve(work_dir: &Path) -> Resolution {
    let work_dir = paths::absolutize(work_dir).unwrap_or_else(|_| paths::clean(work_dir));
    let candidate = local_store_dir(&work_dir);

    let Some(target) = read_redirect(&candidate) else {
        return Resolution {
            store_dir: candidate,
            hops: 0,
            stop: Stop::Authoritative,
        };
    };

    let resolved = paths::join_clean(&work_dir, &target);
    if resolved == candidate {
        tracing::warn!(
            store = %candidate.display(),
            target = %target,
            "redirect points at its own store; removing it"
        );
        remove_redirect(&candidate);
        return Resolution {
            store_dir: candidate,
            hops: 0,
            stop: Stop::SelfRedirectRemoved,
        };
    }

    let mut visited = HashSet::from([candidate]);
    follow_chain(resolved, 1, &mut visited)
}

fn follow_chain(mut current: PathBuf, mut hops: usize, visited: &mut HashSet<PathBuf>) -> Resolution {
    loop {
        visited.insert(current.clone());

        let Some(target) = read_redirect(&current) else {
            return Resolution {
                store_dir: current,
                hops,
                stop: Stop::Authoritative,
            };
        };

        if hops >= MAX_REDIRECT_DEPTH {
            tracing::warn!(
                store = %current.display(),
                max_depth = MAX_REDIRECT_DEPTH,
                "redirect chain too deep; stopping"
            );
            return Resolution {
                store_dir: current,
                hops,
                stop: Stop::TooDeep,
            };
        }

        let base = current.parent().map(Path::to_path_buf).unwrap_or_default();
        let next = paths::join_clean(&base, &target);
        if visited.contains(&next) {
            tracing::warn!(
                store = %current.display(),
                target = %next.display(),
                "redirect cycle detected; stopping"
            );
            return Resolution {
                store_dir: current,
                hops,
                stop: Stop::Cycle,
            };
        }

        current = next;
        hops += 1;
    }
}

/// Best-effort removal; a concurrent resolver may already have removed it.
fn remove_redirect(store_dir: &Path) {
    let path = store_dir.join(REDIRECT_FILE);
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove redirect"),
    }
}
