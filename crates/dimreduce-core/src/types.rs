//! Shared vocabulary types: native libraries, backend requests and the
//! decomposition kinds that can be dispatched.

use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;

use crate::config::{CPU_LIB_PATH_ENV, GPU_LIB_PATH_ENV};
use crate::error::NativeError;

/// A logical native library that can back a decomposition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NativeLibrary {
    /// CUDA-accelerated library (`dimreduce4gpu`).
    Gpu,
    /// CPU fallback library (`dimreduce4cpu`).
    Cpu,
}

impl NativeLibrary {
    /// Base name of the shared object, without platform prefix or suffix.
    pub const fn stem(self) -> &'static str {
        match self {
            Self::Gpu => "dimreduce4gpu",
            Self::Cpu => "dimreduce4cpu",
        }
    }

    /// Environment variable that overrides the search for this library.
    pub const fn override_env(self) -> &'static str {
        match self {
            Self::Gpu => GPU_LIB_PATH_ENV,
            Self::Cpu => CPU_LIB_PATH_ENV,
        }
    }

    /// Backend served by this library.
    pub const fn backend(self) -> ResolvedBackend {
        match self {
            Self::Gpu => ResolvedBackend::Gpu,
            Self::Cpu => ResolvedBackend::Cpu,
        }
    }

    /// Platform-specific file name, e.g. `libdimreduce4gpu.so` or `dimreduce4gpu.dll`.
    pub fn file_name(self) -> OsString {
        libloading::library_filename(self.stem())
    }
}

impl fmt::Display for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Caller intent for backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BackendRequest {
    /// Prefer the GPU when it can run, otherwise fall back to the CPU.
    #[default]
    Auto,
    /// Use the GPU library, failing if it is not runnable.
    Gpu,
    /// Use the CPU library, failing if it is not built.
    Cpu,
}

impl fmt::Display for BackendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Gpu => write!(f, "gpu"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

impl FromStr for BackendRequest {
    type Err = NativeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "gpu" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            other => Err(NativeError::invalid_input(format!(
                "unknown backend '{other}' (expected one of: auto, gpu, cpu)"
            ))),
        }
    }
}

/// Concrete backend chosen by the selector. Never "auto".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ResolvedBackend {
    /// GPU library.
    Gpu,
    /// CPU library.
    Cpu,
}

impl ResolvedBackend {
    /// Library that implements this backend.
    pub const fn library(self) -> NativeLibrary {
        match self {
            Self::Gpu => NativeLibrary::Gpu,
            Self::Cpu => NativeLibrary::Cpu,
        }
    }
}

impl fmt::Display for ResolvedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu => write!(f, "gpu"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// Which native entry point a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecompositionKind {
    /// Mean-centred decomposition, `pca_float`.
    Pca,
    /// Uncentred decomposition, `truncated_svd_float`.
    TruncatedSvd,
}

impl DecompositionKind {
    /// Exported symbol name, NUL-terminated for symbol lookup.
    pub(crate) const fn symbol(self) -> &'static [u8] {
        match self {
            Self::Pca => b"pca_float\0",
            Self::TruncatedSvd => b"truncated_svd_float\0",
        }
    }

    /// Exported symbol name, for messages.
    pub const fn symbol_name(self) -> &'static str {
        match self {
            Self::Pca => "pca_float",
            Self::TruncatedSvd => "truncated_svd_float",
        }
    }

    /// Algorithm used when the caller does not pick one.
    pub const fn default_algorithm(self) -> Algorithm {
        match self {
            Self::Pca => Algorithm::Cusolver,
            Self::TruncatedSvd => Algorithm::Power,
        }
    }
}

/// Solver requested from the native library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Algorithm {
    /// Randomised power iteration.
    Power,
    /// Dense cuSOLVER (or LAPACK on the CPU library).
    Cusolver,
}

impl Algorithm {
    /// Name understood by the native library.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Cusolver => "cusolver",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = NativeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "power" => Ok(Self::Power),
            "cusolver" => Ok(Self::Cusolver),
            other => Err(NativeError::invalid_input(format!(
                "unknown algorithm '{other}' (expected 'power' or 'cusolver')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_request_parsing() {
        assert_eq!("auto".parse::<BackendRequest>().unwrap(), BackendRequest::Auto);
        assert_eq!(" GPU ".parse::<BackendRequest>().unwrap(), BackendRequest::Gpu);
        assert_eq!("cpu".parse::<BackendRequest>().unwrap(), BackendRequest::Cpu);
        assert!("metal".parse::<BackendRequest>().is_err());
        assert_eq!(BackendRequest::default(), BackendRequest::Auto);
    }

    #[test]
    fn test_library_file_name() {
        let name = NativeLibrary::Gpu.file_name();
        let name = name.to_string_lossy();
        assert!(name.contains("dimreduce4gpu"));
        #[cfg(target_os = "linux")]
        assert_eq!(name, "libdimreduce4gpu.so");
        #[cfg(windows)]
        assert_eq!(name, "dimreduce4gpu.dll");
    }

    #[test]
    fn test_symbols_are_nul_terminated() {
        for kind in [DecompositionKind::Pca, DecompositionKind::TruncatedSvd] {
            let sym = kind.symbol();
            assert_eq!(sym.last(), Some(&0));
            assert_eq!(&sym[..sym.len() - 1], kind.symbol_name().as_bytes());
        }
    }

    #[test]
    fn test_algorithm_round_trip_names() {
        assert_eq!(Algorithm::Power.to_string(), "power");
        assert_eq!("cusolver".parse::<Algorithm>().unwrap(), Algorithm::Cusolver);
        assert_eq!(DecompositionKind::Pca.default_algorithm(), Algorithm::Cusolver);
        assert_eq!(DecompositionKind::TruncatedSvd.default_algorithm(), Algorithm::Power);
    }
}
