use std::path::{Component, Path, PathBuf};

/// Lexically clean a path: drop `.` segments, resolve `..` against preceding
/// normal segments, and collapse duplicate separators.
///
/// Purely lexical; symlinks are not consulted. A `..` that would climb above
/// the root of an absolute path is dropped, while leading `..` segments of a
/// relative path are kept.
pub fn clean(path: &Path) -> PathBuf {
    let mut prefix: Option<Component<'_>> = None;
    let mut absolute = false;
    let mut segments: Vec<&std::ffi::OsStr> = Vec::new();
    let mut leading_parents = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) => prefix = Some(component),
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => {
                if segments.pop().is_none() && !absolute {
                    leading_parents += 1;
                }
            }
            Component::Normal(segment) => segments.push(segment),
        }
    }

    let mut out = PathBuf::new();
    if let Some(prefix) = prefix {
        out.push(prefix.as_os_str());
    }
    if absolute {
        out.push(Component::RootDir.as_os_str());
    }
    for _ in 0..leading_parents {
        out.push("..");
    }
    for segment in segments {
        out.push(segment);
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Clean `base.join(target)`; an absolute `target` replaces `base`.
pub fn join_clean(base: &Path, target: &str) -> PathBuf {
    clean(&base.join(target))
}

/// Normal segments of `path` below `base`, after cleaning both.
///
/// Returns `None` when `path` is not inside `base`.
pub fn relative_segments(base: &Path, path: &Path) -> Option<Vec<String>> {
    let base = clean(base);
    let path = clean(path);
    let rest = path.strip_prefix(&base).ok()?;
    Some(
        rest.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect(),
    )
}

/// `../` repeated `depth` times, with a trailing separator.
pub fn up_path(depth: usize) -> String {
    "../".repeat(depth)
}

/// Make a possibly-relative path absolute against the process cwd, then clean it.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(clean(path));
    }
    Ok(clean(&std::env::current_dir()?.join(path)))
}
