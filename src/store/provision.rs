//! Worktree provisioning: point a worktree's store at its unit's
//! authoritative store with a single, direct redirect.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::RegexSet;

use crate::error::{Result, RigError};
use crate::store::paths;
use crate::store::redirect::{self, REDIRECT_FILE, STORE_DIR_NAME};

/// Two-segment suffix (under the unit root) of the canonical store clone.
pub const CANONICAL_SUFFIX: [&str; 2] = ["mayor", "rig"];

/// Database markers that make a unit-root store authoritative on its own.
const DB_MARKERS: [&str; 2] = ["beads.db", "dolt"];

/// Generated runtime artifacts removed from a worktree store before
/// redirecting it. Glob syntax, matched against top-level entry names.
pub const RUNTIME_PATTERNS: &[&str] = &[
    "*.db",
    "*.db-*",
    "*.lock",
    "*.sock",
    "*.pid",
    "daemon.*",
    "metadata.json",
    "last-touched",
    ".local_version",
    "dolt",
];

/// What [`provision`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub redirect_path: PathBuf,
    pub target: String,
    pub used_canonical_fallback: bool,
}

/// Which store a unit's worktrees should point at.
#[derive(Debug, Clone, PartialEq, Eq)]
enum UnitStore {
    /// `<unit>/.state`, possibly itself redirecting.
    Root(PathBuf),
    /// `<unit>/mayor/rig/.state`.
    Canonical,
}

/// Create or repair the redirect for `worktree` so it resolves to the
/// authoritative store of its unit. Safe to call repeatedly.
pub fn provision(town_root: &Path, worktree: &Path) -> Result<Provisioned> {
    let town_root = paths::absolutize(town_root)?;
    let worktree = paths::absolutize(worktree)?;

    let parts = paths::relative_segments(&town_root, &worktree)
        .ok_or_else(|| RigError::WorktreeOutsideTown(worktree.clone(), town_root.clone()))?;
    if parts.len() < 2 {
        return Err(RigError::WorktreeTooShallow(parts.join("/")));
    }
    if parts.len() >= 3 && parts[1] == CANONICAL_SUFFIX[0] && parts[2] == CANONICAL_SUFFIX[1] {
        return Err(RigError::CanonicalLocation(CANONICAL_SUFFIX.join("/")));
    }

    let unit_root = town_root.join(&parts[0]);
    let unit_store = choose_unit_store(&unit_root)?;

    let worktree_store = worktree.join(STORE_DIR_NAME);
    if let Err(e) = clean_runtime_artifacts(&worktree_store) {
        tracing::warn!(
            store = %worktree_store.display(),
            error = %e,
            "could not clean runtime artifacts"
        );
    }
    ensure_store_dir(&worktree_store)?;

    let up = paths::up_path(parts.len() - 1);
    let target = match &unit_store {
        UnitStore::Canonical => format!("{up}{}", canonical_rel()),
        UnitStore::Root(store) => match redirect::read_redirect(store) {
            // Collapse the unit's own redirect so the worktree needs one hop.
            Some(unit_target) if Path::new(&unit_target).is_absolute() => unit_target,
            Some(unit_target) => format!("{up}{unit_target}"),
            None => format!("{up}{STORE_DIR_NAME}"),
        },
    };

    let redirect_path = worktree_store.join(REDIRECT_FILE);
    fs::write(&redirect_path, format!("{target}\n"))?;

    Ok(Provisioned {
        redirect_path,
        target,
        used_canonical_fallback: unit_store == UnitStore::Canonical,
    })
}

/// `mayor/rig/.state`
fn canonical_rel() -> String {
    format!("{}/{}/{STORE_DIR_NAME}", CANONICAL_SUFFIX[0], CANONICAL_SUFFIX[1])
}

fn canonical_store(unit_root: &Path) -> PathBuf {
    unit_root
        .join(CANONICAL_SUFFIX[0])
        .join(CANONICAL_SUFFIX[1])
        .join(STORE_DIR_NAME)
}

fn choose_unit_store(unit_root: &Path) -> Result<UnitStore> {
    let root_store = unit_root.join(STORE_DIR_NAME);
    let canonical = canonical_store(unit_root);

    if !root_store.is_dir() {
        if !canonical.is_dir() {
            return Err(RigError::NoStoreFound(root_store, canonical));
        }
        tracing::warn!(
            missing = %root_store.display(),
            using = %canonical.display(),
            "unit store not found; falling back to canonical store (repair the unit store configuration)"
        );
        return Ok(UnitStore::Canonical);
    }

    // A metadata-only unit store defers to the canonical clone's database.
    if !has_database(&root_store) && !redirect::has_redirect(&root_store) && canonical.is_dir() {
        return Ok(UnitStore::Canonical);
    }

    Ok(UnitStore::Root(root_store))
}

fn has_database(store: &Path) -> bool {
    DB_MARKERS.iter().any(|m| store.join(m).exists())
}

/// Replace a stale non-directory at `store` with a directory.
fn ensure_store_dir(store: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(store)
        && !meta.is_dir()
    {
        fs::remove_file(store)?;
    }
    fs::create_dir_all(store)?;
    Ok(())
}

fn runtime_matcher() -> &'static RegexSet {
    static MATCHER: OnceLock<RegexSet> = OnceLock::new();
    MATCHER.get_or_init(|| {
        let patterns: Vec<String> = RUNTIME_PATTERNS.iter().map(|p| glob_to_regex(p)).collect();
        // Patterns are fixed literals; compilation cannot fail.
        RegexSet::new(patterns).unwrap_or_else(|_| RegexSet::empty())
    })
}

fn glob_to_regex(glob: &str) -> String {
    let mut re = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    re
}

/// Whether `name` is a generated runtime artifact.
pub fn is_runtime_artifact(name: &str) -> bool {
    runtime_matcher().is_match(name)
}

/// Remove runtime artifacts from `store`, keeping tracked files.
///
/// A missing `store` is a no-op. Every entry is attempted; the first
/// failure is returned after the sweep. A non-directory at `store` is left
/// for [`ensure_store_dir`].
pub fn clean_runtime_artifacts(store: &Path) -> std::io::Result<Vec<String>> {
    let entries = match fs::read_dir(store) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound || e.kind() == ErrorKind::NotADirectory => {
            return Ok(vec![]);
        }
        Err(e) => return Err(e),
    };

    let mut removed = Vec::new();
    let mut first_err: Option<std::io::Error> = None;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                first_err.get_or_insert(e);
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_runtime_artifact(&name) {
            continue;
        }
        let path = entry.path();
        let result = match entry.file_type() {
            Ok(ft) if ft.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => removed.push(name),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => {
            removed.sort();
            Ok(removed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::redirect::resolve_store_dir;
    use tempfile::tempdir;

    struct Town {
        _dir: tempfile::TempDir,
        root: PathBuf,
        rig: PathBuf,
    }

    fn town() -> Town {
        let dir = tempdir().unwrap();
        let root = paths::clean(dir.path());
        let rig = root.join("testrig");
        fs::create_dir_all(&rig).unwrap();
        Town {
            _dir: dir,
            root,
            rig,
        }
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn crew_worktree_points_at_unit_store() {
        let t = town();
        fs::create_dir_all(t.rig.join(STORE_DIR_NAME)).unwrap();
        let crew = t.rig.join("crew").join("max");
        fs::create_dir_all(&crew).unwrap();

        let p = provision(&t.root, &crew).unwrap();
        assert_eq!(p.target, "../../.state");
        assert!(!p.used_canonical_fallback);
        assert_eq!(read(&crew.join(".state/redirect")), "../../.state\n");
        assert_eq!(resolve_store_dir(&crew), t.rig.join(STORE_DIR_NAME));
    }

    #[test]
    fn provisioning_twice_is_byte_identical() {
        let t = town();
        fs::create_dir_all(t.rig.join(STORE_DIR_NAME)).unwrap();
        let crew = t.rig.join("crew").join("max");

        provision(&t.root, &crew).unwrap();
        let first = fs::read(crew.join(".state/redirect")).unwrap();
        provision(&t.root, &crew).unwrap();
        let second = fs::read(crew.join(".state/redirect")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unit_redirect_is_collapsed_into_one_hop() {
        let t = town();
        let canonical = t.rig.join("mayor/rig/.state");
        fs::create_dir_all(&canonical).unwrap();
        fs::create_dir_all(t.rig.join(STORE_DIR_NAME)).unwrap();
        fs::write(t.rig.join(".state/redirect"), "mayor/rig/.state\n").unwrap();
        let crew = t.rig.join("crew").join("max");

        provision(&t.root, &crew).unwrap();
        assert_eq!(read(&crew.join(".state/redirect")), "../../mayor/rig/.state\n");

        let r = redirect::resolve(&crew);
        assert_eq!(r.store_dir, canonical);
        assert_eq!(r.hops, 1);
    }

    #[test]
    fn metadata_only_unit_store_defers_to_canonical() {
        let t = town();
        fs::create_dir_all(t.rig.join(STORE_DIR_NAME)).unwrap();
        fs::write(t.rig.join(".state/metadata.json"), r#"{"backend":"dolt"}"#).unwrap();
        fs::create_dir_all(t.rig.join("mayor/rig/.state/dolt")).unwrap();
        let crew = t.rig.join("crew").join("max");

        let p = provision(&t.root, &crew).unwrap();
        assert!(p.used_canonical_fallback);
        assert_eq!(read(&crew.join(".state/redirect")), "../../mayor/rig/.state\n");
        assert_eq!(resolve_store_dir(&crew), t.rig.join("mayor/rig/.state"));
    }

    #[test]
    fn unit_store_with_database_wins_over_canonical() {
        let t = town();
        fs::create_dir_all(t.rig.join(STORE_DIR_NAME)).unwrap();
        fs::write(t.rig.join(".state/beads.db"), "").unwrap();
        fs::create_dir_all(t.rig.join("mayor/rig/.state")).unwrap();
        let polecat = t.rig.join("polecats").join("worker1");

        let p = provision(&t.root, &polecat).unwrap();
        assert!(!p.used_canonical_fallback);
        assert_eq!(p.target, "../../.state");
    }

    #[test]
    fn missing_unit_store_falls_back_to_canonical() {
        let t = town();
        fs::create_dir_all(t.rig.join("mayor/rig/.state")).unwrap();
        let crew = t.rig.join("crew").join("max");

        let p = provision(&t.root, &crew).unwrap();
        assert!(p.used_canonical_fallback);
        assert_eq!(p.target, "../../mayor/rig/.state");
    }

    #[test]
    fn refinery_worktree_two_levels_deep() {
        let t = town();
        fs::create_dir_all(t.rig.join(STORE_DIR_NAME)).unwrap();
        let refinery = t.rig.join("refinery").join("rig");

        provision(&t.root, &refinery).unwrap();
        assert_eq!(read(&refinery.join(".state/redirect")), "../../.state\n");
    }

    #[test]
    fn deeper_worktree_gets_longer_up_path() {
        let t = town();
        fs::create_dir_all(t.rig.join(STORE_DIR_NAME)).unwrap();
        let deep = t.rig.join("crew").join("max").join("sub");

        let p = provision(&t.root, &deep).unwrap();
        assert_eq!(p.target, "../../../.state");
        assert_eq!(resolve_store_dir(&deep), t.rig.join(STORE_DIR_NAME));
    }

    #[test]
    fn rejects_canonical_location_without_writing() {
        let t = town();
        fs::create_dir_all(t.rig.join(STORE_DIR_NAME)).unwrap();
        let mayor_rig = t.rig.join("mayor").join("rig");
        fs::create_dir_all(&mayor_rig).unwrap();

        let err = provision(&t.root, &mayor_rig).unwrap_err();
        assert!(matches!(err, RigError::CanonicalLocation(_)));
        assert!(err.to_string().contains("canonical"));
        assert!(!mayor_rig.join(".state/redirect").exists());
    }

    #[test]
    fn rejects_shallow_and_outside_paths() {
        let t = town();
        let err = provision(&t.root, &t.rig).unwrap_err();
        assert!(matches!(err, RigError::WorktreeTooShallow(_)));

        let other = tempdir().unwrap();
        let err = provision(&t.root, &other.path().join("a/b")).unwrap_err();
        assert!(matches!(err, RigError::WorktreeOutsideTown(_, _)));
    }

    #[test]
    fn fails_when_no_store_exists() {
        let t = town();
        let crew = t.rig.join("crew").join("max");
        fs::create_dir_all(&crew).unwrap();

        let err = provision(&t.root, &crew).unwrap_err();
        assert!(matches!(err, RigError::NoStoreFound(_, _)));
        assert!(!crew.join(".state/redirect").exists());
    }

    #[test]
    fn cleans_runtime_files_and_keeps_tracked_files() {
        let t = town();
        fs::create_dir_all(t.rig.join(STORE_DIR_NAME)).unwrap();
        let crew = t.rig.join("crew").join("max");
        let store = crew.join(STORE_DIR_NAME);
        fs::create_dir_all(store.join("dolt")).unwrap();
        for name in ["daemon.lock", "metadata.json", "beads.db", "beads.db-wal", "bd.sock"] {
            fs::write(store.join(name), "x").unwrap();
        }
        for name in ["config.yaml", "README.md", "routes.jsonl", "PRIME.md"] {
            fs::write(store.join(name), "keep").unwrap();
        }

        provision(&t.root, &crew).unwrap();

        for name in ["daemon.lock", "metadata.json", "beads.db", "beads.db-wal", "bd.sock", "dolt"] {
            assert!(!store.join(name).exists(), "{name} should be removed");
        }
        for name in ["config.yaml", "README.md", "routes.jsonl", "PRIME.md"] {
            assert!(store.join(name).exists(), "{name} should be kept");
        }
        assert!(store.join(REDIRECT_FILE).exists());
    }

    #[test]
    fn replaces_stale_store_file_with_directory() {
        let t = town();
        fs::create_dir_all(t.rig.join(STORE_DIR_NAME)).unwrap();
        let crew = t.rig.join("crew").join("max");
        fs::create_dir_all(&crew).unwrap();
        fs::write(crew.join(STORE_DIR_NAME), "stale content").unwrap();

        provision(&t.root, &crew).unwrap();
        assert!(crew.join(STORE_DIR_NAME).is_dir());
        assert_eq!(read(&crew.join(".state/redirect")), "../../.state\n");
    }

    #[test]
    fn cleaning_missing_dir_is_noop() {
        let dir = tempdir().unwrap();
        assert!(clean_runtime_artifacts(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn runtime_pattern_matching() {
        assert!(is_runtime_artifact("daemon.lock"));
        assert!(is_runtime_artifact("daemon.log"));
        assert!(is_runtime_artifact("beads.db-shm"));
        assert!(is_runtime_artifact("last-touched"));
        assert!(!is_runtime_artifact("config.yaml"));
        assert!(!is_runtime_artifact("redirect"));
        assert!(!is_runtime_artifact("issues.jsonl"));
        assert!(!is_runtime_artifact("xdb"));
    }
}
