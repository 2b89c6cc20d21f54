//! Path helpers shared by the easycom scanner and the confusion plugin.
//!
//! Every path handed back to the bundler uses forward slashes, so all
//! helpers here funnel through [`normalize_path`].

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

lazy_static! {
    static ref TRAILING_EXT_RE: Regex = Regex::new(r"\.\w+$").unwrap();
}

/// Converts Windows separators to `/`. A no-op elsewhere.
pub fn normalize_path(id: &str) -> String {
    if cfg!(windows) {
        id.replace('\\', "/")
    } else {
        id.to_string()
    }
}

/// Lossy `Path` to normalized string.
pub fn path_to_string(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

/// Resolves `path` against `base` and lexically removes `.` and `..`
/// components. Relative bases are first made absolute against the current
/// working directory. Nothing is read from disk.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let absolute = if joined.is_absolute() {
        joined
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&joined))
            .unwrap_or(joined)
    };
    clean(&absolute)
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Path of `to` relative to `from`, normalized with `/`.
///
/// Both paths are resolved lexically first, so `from` does not need to be a
/// prefix of `to`.
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from = resolve_path(Path::new("."), from);
    let to = resolve_path(Path::new("."), to);
    let from_parts: Vec<Component> = from.components().collect();
    let to_parts: Vec<Component> = to.components().collect();

    let shared = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in shared..from_parts.len() {
        rel.push("..");
    }
    for part in &to_parts[shared..] {
        rel.push(part);
    }
    path_to_string(&rel)
}

/// Strips `ext` (or any trailing `.word` extension when `ext` is `None`).
pub fn remove_ext(s: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => normalize_path(s.strip_suffix(ext).unwrap_or(s)),
        None => normalize_path(&TRAILING_EXT_RE.replace(s, "")),
    }
}
