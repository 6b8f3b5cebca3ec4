//! Library discovery.
//!
//! Candidate directories are checked in a fixed order and the first one that
//! holds the platform-specific library file as a regular file wins:
//!
//! 1. the per-library environment override (a file's parent directory is used),
//! 2. the bundled `<package_dir>/lib`,
//! 3. the legacy `<prefix>/dimreduce4gpu`,
//! 4. the legacy sibling `<package_dir>/../lib`.
//!
//! Relative roots are anchored at the current directory, so every candidate
//! and every resolved path is absolute.
//!
//! Filesystem errors are treated as "not found". Results are never cached.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{absolutize, SearchConfig, LEGACY_PREFIX_SUBDIR};
use crate::types::NativeLibrary;

/// Outcome of one lookup for a logical library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDescriptor {
    library: NativeLibrary,
    candidates: Vec<PathBuf>,
    resolved: Option<PathBuf>,
}

impl LibraryDescriptor {
    /// Logical library that was searched for.
    pub fn library(&self) -> NativeLibrary {
        self.library
    }

    /// Candidate directories in search order.
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Resolved library file, if any candidate held it.
    pub fn resolved(&self) -> Option<&Path> {
        self.resolved.as_deref()
    }

    /// Consume the descriptor, returning the resolved path.
    pub fn into_resolved(self) -> Option<PathBuf> {
        self.resolved
    }
}

/// Ordered candidate directories for `library` under `config`.
pub fn candidate_dirs(library: NativeLibrary, config: &SearchConfig) -> Vec<PathBuf> {
    let mut dirs = Vec::with_capacity(4);

    if let Some(raw) = config.override_for(library) {
        let raw = absolutize(raw);
        if is_regular_file(&raw) {
            if let Some(parent) = raw.parent() {
                dirs.push(parent.to_path_buf());
            }
        } else {
            dirs.push(raw);
        }
    }

    let package_dir = absolutize(&config.package_dir);
    dirs.push(package_dir.join("lib"));
    dirs.push(absolutize(&config.prefix).join(LEGACY_PREFIX_SUBDIR));
    dirs.push(legacy_sibling_lib(&package_dir));

    let mut unique: Vec<PathBuf> = Vec::with_capacity(dirs.len());
    for dir in dirs {
        if !unique.contains(&dir) {
            unique.push(dir);
        }
    }
    unique
}

/// Search for `library` using an explicit configuration.
pub fn describe_with(library: NativeLibrary, config: &SearchConfig) -> LibraryDescriptor {
    let candidates = candidate_dirs(library, config);
    let file_name = library.file_name();

    let resolved = candidates.iter().find_map(|dir| {
        let candidate = dir.join(&file_name);
        log::trace!("checking {} for {}", candidate.display(), library);
        is_regular_file(&candidate).then_some(candidate)
    });

    match &resolved {
        Some(path) => log::debug!("{} resolved to {}", library, path.display()),
        None => log::debug!("{} not found in {} candidate directories", library, candidates.len()),
    }

    if let Some(raw) = config.override_for(library) {
        let from_override = resolved
            .as_deref()
            .and_then(Path::parent)
            .is_some_and(|dir| Some(dir) == candidates.first().map(PathBuf::as_path));
        if !from_override {
            log::warn!(
                "{} is set to {} but {} is not there; using the default search",
                library.override_env(),
                raw.display(),
                file_name.to_string_lossy()
            );
        }
    }

    LibraryDescriptor {
        library,
        candidates,
        resolved,
    }
}

/// Search for `library` using the current process environment.
pub fn describe(library: NativeLibrary) -> LibraryDescriptor {
    describe_with(library, &SearchConfig::from_env())
}

/// Path of `library` under `config`, if it exists.
pub fn locate_with(library: NativeLibrary, config: &SearchConfig) -> Option<PathBuf> {
    describe_with(library, config).into_resolved()
}

/// Path of `library` under the current process environment, if it exists.
pub fn locate(library: NativeLibrary) -> Option<PathBuf> {
    describe(library).into_resolved()
}

fn legacy_sibling_lib(package_dir: &Path) -> PathBuf {
    package_dir
        .parent()
        .map_or_else(|| package_dir.join("..").join("lib"), |p| p.join("lib"))
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
