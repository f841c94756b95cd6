//! Module resolution.
//!
//! An import path is looked up relative to the importing file first
//! (`DIR/path.nfu`, then `DIR/path/index.nfu`) and falls back to the embedded
//! standard library. Loaded modules are cached by canonical path; a module in
//! `Loading` state that is reached again marks an import cycle.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::value::Value;

/// The standard library, embedded at build time. Entries are looked up by
/// module path after local files are ruled out.
pub const STDLIB: &[(&str, &str)] = &[("builtins", include_str!("../stdlib/builtins.nfu"))];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Loading,
    Ready,
    Failed,
}

pub struct ModuleRecord {
    pub exports: IndexMap<String, Value>,
    pub state: ModuleState,
}

impl ModuleRecord {
    pub fn loading() -> Self {
        Self {
            exports: IndexMap::new(),
            state: ModuleState::Loading,
        }
    }
}

/// Where a module path resolved to.
pub enum Resolved {
    File(PathBuf),
    Stdlib(&'static str, &'static str),
}

/// Module names are restricted to `[A-Za-z0-9_./-]` with no empty path
/// segments.
pub fn valid_module_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-'));
    chars_ok && name.split('/').all(|segment| !segment.is_empty())
}

pub fn resolve(name: &str, importer_dir: &Path) -> Option<Resolved> {
    let direct = importer_dir.join(format!("{name}.nfu"));
    if direct.is_file() {
        return Some(Resolved::File(direct));
    }
    let index = importer_dir.join(name).join("index.nfu");
    if index.is_file() {
        return Some(Resolved::File(index));
    }
    STDLIB
        .iter()
        .find(|(entry, _)| *entry == name || format!("{entry}/index") == name)
        .map(|&(entry, source)| Resolved::Stdlib(entry, source))
}

/// Cache key for a loaded module. Filesystem modules canonicalize so the same
/// file reached through different relative paths evaluates once.
pub fn canonical_key(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// The last path segment, used as the prefix for `import "path"` bindings.
pub fn module_prefix(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
