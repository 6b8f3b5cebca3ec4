//! Error types for native backend resolution and dispatch.
//!
//! Every way a native backend can fail to serve a call (missing file, loader
//! failure, missing symbol, no usable device) surfaces as
//! [`NativeError::BackendUnavailable`], carrying the specific
//! [`UnavailableCause`]. Shape problems detected before the native boundary
//! are reported as [`NativeError::InvalidInput`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{NativeLibrary, ResolvedBackend};

/// Why a native backend cannot serve a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnavailableCause {
    /// No candidate path held the library file.
    #[error(
        "{library} native library not found (searched: {}); build it into the bundled `lib/` directory or set {} to its file or directory",
        DisplayPaths(.searched),
        .library.override_env()
    )]
    NotFound {
        /// Library that was searched for
        library: NativeLibrary,
        /// Every directory that was checked, in search order
        searched: Vec<PathBuf>,
    },

    /// The file exists but the dynamic loader rejected it.
    ///
    /// This usually means a transitive dependency (CUDA runtime, BLAS) is missing.
    #[error("{library} native library found at {} but could not be loaded: {message}", .path.display())]
    LoadFailed {
        /// Library that failed to load
        library: NativeLibrary,
        /// Path handed to the loader
        path: PathBuf,
        /// Loader message
        message: String,
    },

    /// The library loaded but does not export the expected entry point.
    #[error("entry point '{symbol}' missing from native library: {message}")]
    SymbolMissing {
        /// Symbol that was looked up
        symbol: String,
        /// Loader message
        message: String,
    },

    /// The library is built but the environment cannot execute it.
    #[error(
        "environment cannot run GPU code: {reason}; this needs the NVIDIA driver (libcuda.so.1), at least one CUDA-capable device and a CUDA runtime compatible with the driver"
    )]
    NotRunnable {
        /// Specific probe failure (driver missing, zero devices, init error)
        reason: String,
    },
}

/// Errors raised by the resolution and dispatch layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    /// The resolved backend cannot serve the call.
    ///
    /// Explicit backend requests that are not capable end up here too; they
    /// are never downgraded to the other backend.
    #[error("native {backend} backend unavailable: {cause}")]
    BackendUnavailable {
        /// Backend the call was resolved to
        backend: ResolvedBackend,
        /// Underlying failure
        #[source]
        cause: UnavailableCause,
    },

    /// Input rejected before crossing the native boundary.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Description of the problem
        reason: String,
    },
}

impl NativeError {
    /// Create a BackendUnavailable error.
    pub fn unavailable(backend: ResolvedBackend, cause: UnavailableCause) -> Self {
        Self::BackendUnavailable { backend, cause }
    }

    /// Create a BackendUnavailable error for a library that was not found.
    pub fn not_found(backend: ResolvedBackend, searched: Vec<PathBuf>) -> Self {
        Self::unavailable(
            backend,
            UnavailableCause::NotFound {
                library: backend.library(),
                searched,
            },
        )
    }

    /// Create a BackendUnavailable error for a loader failure.
    pub fn load_failed<S: Into<String>>(backend: ResolvedBackend, path: PathBuf, message: S) -> Self {
        Self::unavailable(
            backend,
            UnavailableCause::LoadFailed {
                library: backend.library(),
                path,
                message: message.into(),
            },
        )
    }

    /// Create a BackendUnavailable error for a missing entry point.
    pub fn symbol_missing<S1, S2>(backend: ResolvedBackend, symbol: S1, message: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::unavailable(
            backend,
            UnavailableCause::SymbolMissing {
                symbol: symbol.into(),
                message: message.into(),
            },
        )
    }

    /// Create a BackendUnavailable error for a device/driver probe failure.
    pub fn not_runnable<S: Into<String>>(reason: S) -> Self {
        Self::unavailable(
            ResolvedBackend::Gpu,
            UnavailableCause::NotRunnable {
                reason: reason.into(),
            },
        )
    }

    /// Create an InvalidInput error.
    pub fn invalid_input<S: Into<String>>(reason: S) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Backend the error refers to, if any.
    pub fn backend(&self) -> Option<ResolvedBackend> {
        match self {
            Self::BackendUnavailable { backend, .. } => Some(*backend),
            Self::InvalidInput { .. } => None,
        }
    }

    /// True for the "native backend unavailable" kind.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}

/// Result type alias for operations that can produce NativeError.
pub type Result<T> = std::result::Result<T, NativeError>;

struct DisplayPaths<'a>(&'a [PathBuf]);

impl fmt::Display for DisplayPaths<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", path.display())?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_creation() {
        let err = NativeError::invalid_input("expected a 2D matrix, got 3 dimensions");
        assert!(matches!(err, NativeError::InvalidInput { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid input: expected a 2D matrix, got 3 dimensions"
        );
        assert!(!err.is_unavailable());
        assert_eq!(err.backend(), None);
    }

    #[test]
    fn test_not_found_lists_searched_paths() {
        let err = NativeError::not_found(
            ResolvedBackend::Cpu,
            vec![PathBuf::from("/opt/a"), PathBuf::from("/opt/b")],
        );
        let msg = err.to_string();
        assert!(msg.starts_with("native cpu backend unavailable"));
        assert!(msg.contains("dimreduce4cpu"));
        assert!(msg.contains("[/opt/a, /opt/b]"));
        assert!(msg.contains("DIMREDUCE4GPU_CPU_LIB_PATH"));

        let gpu = NativeError::not_found(ResolvedBackend::Gpu, Vec::new()).to_string();
        assert!(gpu.contains("DIMREDUCE4GPU_LIB_PATH"));
        assert!(!gpu.contains("CPU_LIB_PATH"));
        assert_eq!(err.backend(), Some(ResolvedBackend::Cpu));
    }

    #[test]
    fn test_cause_chain_is_exposed() {
        let err = NativeError::not_runnable("no CUDA devices detected (device count is 0)");
        assert!(err.is_unavailable());
        let source = err.source().expect("cause should be chained");
        assert!(source
            .to_string()
            .starts_with("environment cannot run GPU code: no CUDA devices detected (device count is 0);"));
        assert!(source.to_string().contains("libcuda.so.1"));
    }

    #[test]
    fn test_load_failure_message() {
        let err = NativeError::load_failed(
            ResolvedBackend::Gpu,
            PathBuf::from("/lib/libdimreduce4gpu.so"),
            "libcudart.so.12: cannot open shared object file",
        );
        let msg = err.to_string();
        assert!(msg.contains("/lib/libdimreduce4gpu.so"));
        assert!(msg.contains("libcudart.so.12"));
    }
}
