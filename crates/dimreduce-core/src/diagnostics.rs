//! Diagnostics for external tooling.
//!
//! [`report`] aggregates locator and prober output into a stable record.
//! It never fails: with no native library anywhere on the search path every
//! field is simply false or `None`. Test harnesses use it to decide whether
//! GPU-only tests should be skipped.

use std::fmt;
use std::path::Path;

use crate::probe::{DeviceDriver, Prober};
use crate::types::NativeLibrary;

/// Crate version reported in diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Availability of the GPU native library.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiagnosticsReport {
    /// Library version.
    pub version: String,
    /// GPU library located and loadable.
    pub native_built: bool,
    /// GPU library built and a CUDA device usable.
    pub native_runnable: bool,
    /// Resolved GPU library path.
    pub native_library_path: Option<String>,
}

/// [`DiagnosticsReport`] plus the CPU library and the probe reason.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtendedReport {
    /// GPU fields.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub native: DiagnosticsReport,
    /// Why the GPU library is not runnable; empty when it is.
    pub native_reason: String,
    /// CUDA devices visible to the driver.
    pub device_count: u32,
    /// CPU library located and loadable.
    pub cpu_built: bool,
    /// Resolved CPU library path.
    pub cpu_library_path: Option<String>,
}

impl<D: DeviceDriver> Prober<D> {
    /// Build the GPU diagnostics report.
    pub fn report(&self) -> DiagnosticsReport {
        let path = self.locate(NativeLibrary::Gpu).into_resolved();
        let state = self.capability(NativeLibrary::Gpu);
        DiagnosticsReport {
            version: VERSION.to_string(),
            native_built: state.is_built(),
            native_runnable: state.is_runnable(),
            native_library_path: path.map(|p| p.display().to_string()),
        }
    }

    /// Build the report covering both libraries.
    pub fn report_all(&self) -> ExtendedReport {
        let gpu_path = self.locate(NativeLibrary::Gpu).into_resolved();
        let gpu = self.capability(NativeLibrary::Gpu);
        let cpu_path = self.locate(NativeLibrary::Cpu).into_resolved();
        let cpu = self.capability(NativeLibrary::Cpu);
        ExtendedReport {
            native: DiagnosticsReport {
                version: VERSION.to_string(),
                native_built: gpu.is_built(),
                native_runnable: gpu.is_runnable(),
                native_library_path: gpu_path.map(|p| p.display().to_string()),
            },
            native_reason: gpu.reason().to_string(),
            device_count: gpu.device_count(),
            cpu_built: cpu.is_built(),
            cpu_library_path: cpu_path.map(|p| p.display().to_string()),
        }
    }
}

/// GPU diagnostics for the current environment.
pub fn report() -> DiagnosticsReport {
    Prober::from_env().report()
}

/// Diagnostics for both libraries under the current environment.
pub fn report_all() -> ExtendedReport {
    Prober::from_env().report_all()
}

#[cfg(feature = "serde")]
impl DiagnosticsReport {
    /// Pretty JSON with keys in sorted order.
    pub fn to_json(&self) -> String {
        // Going through `Value` sorts the keys (serde_json's map is a BTreeMap).
        serde_json::to_value(self)
            .and_then(|value| serde_json::to_string_pretty(&value))
            .unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

#[cfg(feature = "serde")]
impl ExtendedReport {
    /// Pretty JSON with keys in sorted order.
    pub fn to_json(&self) -> String {
        serde_json::to_value(self)
            .and_then(|value| serde_json::to_string_pretty(&value))
            .unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

impl fmt::Display for DiagnosticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dimreduce {}", self.version)?;
        writeln!(f, "native built:     {}", self.native_built)?;
        writeln!(f, "native runnable:  {}", self.native_runnable)?;
        writeln!(
            f,
            "native path:      {}",
            self.native_library_path.as_deref().unwrap_or("<none>")
        )?;

        if let Some(path) = &self.native_library_path {
            if !Path::new(path).exists() {
                writeln!(f, "note: native path was resolved but does not exist on disk")?;
            }
        }

        if self.native_built && !self.native_runnable {
            writeln!(
                f,
                "hint: native library is present, but GPU execution is not available in this environment."
            )?;
            writeln!(
                f,
                "      On Linux this usually means the NVIDIA driver (libcuda.so.1) is missing,"
            )?;
            writeln!(f, "      or no CUDA-capable GPU is present.")?;
        }
        Ok(())
    }
}

impl fmt::Display for ExtendedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.native)?;
        if !self.native_reason.is_empty() {
            writeln!(f, "native reason:    {}", self.native_reason)?;
        }
        writeln!(f, "cuda devices:     {}", self.device_count)?;
        writeln!(f, "cpu built:        {}", self.cpu_built)?;
        writeln!(
            f,
            "cpu path:         {}",
            self.cpu_library_path.as_deref().unwrap_or("<none>")
        )
    }
}
