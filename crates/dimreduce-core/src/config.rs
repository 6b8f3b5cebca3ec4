//! Runtime configuration: environment variables and library search roots.
//!
//! Nothing here is cached. [`SearchConfig::from_env`] reads the process
//! environment at the moment it is called, so a library dropped into place by
//! a build step is picked up by the next lookup.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::types::NativeLibrary;

/// Override for the GPU library (file or containing directory).
pub const GPU_LIB_PATH_ENV: &str = "DIMREDUCE4GPU_LIB_PATH";

/// Override for the CPU library (file or containing directory).
pub const CPU_LIB_PATH_ENV: &str = "DIMREDUCE4GPU_CPU_LIB_PATH";

/// Override for the package directory that holds the bundled `lib/`.
pub const PACKAGE_DIR_ENV: &str = "DIMREDUCE_PACKAGE_DIR";

/// Override for the installation prefix used by the legacy search location.
pub const PREFIX_ENV: &str = "DIMREDUCE_PREFIX";

/// Directory name under the prefix used by older installations.
pub const LEGACY_PREFIX_SUBDIR: &str = "dimreduce4gpu";

/// Roots used by the library locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Directory that holds the bundled `lib/` directory.
    pub package_dir: PathBuf,
    /// Installation prefix for the legacy `<prefix>/dimreduce4gpu` location.
    pub prefix: PathBuf,
    /// Raw override for the GPU library.
    pub gpu_override: Option<PathBuf>,
    /// Raw override for the CPU library.
    pub cpu_override: Option<PathBuf>,
}

impl SearchConfig {
    /// Snapshot the current process environment.
    pub fn from_env() -> Self {
        let package_dir = env_path(PACKAGE_DIR_ENV).unwrap_or_else(default_package_dir);
        let prefix = env_path(PREFIX_ENV).unwrap_or_else(|| {
            package_dir
                .parent()
                .map_or_else(|| package_dir.clone(), Path::to_path_buf)
        });

        Self {
            package_dir,
            prefix,
            gpu_override: env_path(GPU_LIB_PATH_ENV),
            cpu_override: env_path(CPU_LIB_PATH_ENV),
        }
    }

    /// Start a builder with explicit roots and no overrides.
    pub fn builder(package_dir: impl Into<PathBuf>) -> SearchConfigBuilder {
        SearchConfigBuilder::new(package_dir)
    }

    /// Override configured for `library`, if any.
    pub fn override_for(&self, library: NativeLibrary) -> Option<&Path> {
        match library {
            NativeLibrary::Gpu => self.gpu_override.as_deref(),
            NativeLibrary::Cpu => self.cpu_override.as_deref(),
        }
    }
}

/// Builder for creating a custom search configuration.
#[derive(Debug, Clone)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Create a builder rooted at `package_dir`; the prefix defaults to its parent.
    pub fn new(package_dir: impl Into<PathBuf>) -> Self {
        let package_dir = package_dir.into();
        let prefix = package_dir
            .parent()
            .map_or_else(|| package_dir.clone(), Path::to_path_buf);
        Self {
            config: SearchConfig {
                package_dir,
                prefix,
                gpu_override: None,
                cpu_override: None,
            },
        }
    }

    /// Set the installation prefix.
    pub fn prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    /// Set the override for one library.
    pub fn override_path(mut self, library: NativeLibrary, path: impl Into<PathBuf>) -> Self {
        let path = Some(path.into());
        match library {
            NativeLibrary::Gpu => self.config.gpu_override = path,
            NativeLibrary::Cpu => self.config.cpu_override = path,
        }
        self
    }

    /// Build the configuration.
    pub fn build(self) -> SearchConfig {
        self.config
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    let raw = env::var_os(key)?;
    if raw.is_empty() || raw.to_str().is_some_and(|s| s.trim().is_empty()) {
        return None;
    }
    Some(absolutize(&expand_home(&raw)))
}

/// Expand a leading `~` using `HOME` (or `USERPROFILE` on Windows).
///
/// Values that are not valid UTF-8 are returned untouched.
pub(crate) fn expand_home(raw: &OsStr) -> PathBuf {
    let Some(text) = raw.to_str() else {
        return PathBuf::from(raw);
    };
    let rest = match text.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return PathBuf::from(raw),
    };
    let home = env::var_os("HOME").or_else(|| env::var_os("USERPROFILE"));
    match home {
        Some(home) => {
            let mut path = PathBuf::from(home);
            let rest = rest.trim_start_matches(['/', '\\']);
            if !rest.is_empty() {
                path.push(rest);
            }
            path
        }
        None => PathBuf::from(raw),
    }
}

/// Anchor a relative path at the current directory.
///
/// Symlinks and `..` are left alone; if the current directory is unknown the
/// path is returned as given.
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    if path.as_os_str().is_empty() {
        return env::current_dir().unwrap_or_default();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn default_package_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
