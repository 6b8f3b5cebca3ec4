//! Capability probing for the native backends.
//!
//! Two tiers are distinguished:
//!
//! - **built**: the library file was located and the dynamic loader accepted it;
//! - **runnable** (GPU only): built, and the CUDA driver runtime loads,
//!   initialises and reports at least one device.
//!
//! Neither probe allocates device memory or launches work, and neither caches
//! anything: every call re-reads the filesystem and re-queries the driver.

use std::ffi::{c_int, c_uint};
use std::fmt;
use std::path::PathBuf;

use libloading::Library;

use crate::config::SearchConfig;
use crate::error::{NativeError, Result, UnavailableCause};
use crate::locator::{self, LibraryDescriptor};
use crate::types::{NativeLibrary, ResolvedBackend};

/// Reason recorded when the library file could not be located.
pub const NOT_BUILT_REASON: &str = "native library is not built";

/// Capability of one native library at the moment it was probed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CapabilityState {
    built: bool,
    runnable: bool,
    device_count: u32,
    reason: String,
}

impl CapabilityState {
    /// Library missing or rejected by the loader.
    pub fn not_built<S: Into<String>>(reason: S) -> Self {
        Self {
            built: false,
            runnable: false,
            device_count: 0,
            reason: reason.into(),
        }
    }

    /// Library loads but cannot execute.
    pub fn built_only<S: Into<String>>(reason: S) -> Self {
        Self {
            built: true,
            runnable: false,
            device_count: 0,
            reason: reason.into(),
        }
    }

    /// Library loads and can execute on `device_count` devices.
    pub fn runnable(device_count: u32) -> Self {
        Self {
            built: true,
            runnable: true,
            device_count,
            reason: String::new(),
        }
    }

    /// The library was located and loaded.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// The library can execute in this environment.
    pub fn is_runnable(&self) -> bool {
        self.runnable
    }

    /// Number of devices reported by the driver (0 for the CPU backend).
    pub fn device_count(&self) -> u32 {
        self.device_count
    }

    /// Why the library is not runnable; empty when it is.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Driver-level device query used by the GPU runnable probe.
///
/// Implementations must not allocate device memory or launch kernels.
pub trait DeviceDriver: fmt::Debug {
    /// Initialise the driver and return the number of visible devices.
    ///
    /// The error is a human-readable reason suitable for
    /// [`CapabilityState::reason`].
    fn device_count(&self) -> std::result::Result<u32, String>;
}

/// CUDA driver API (`libcuda`) queried through dynamic loading.
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaDriver;

const CUDA_SUCCESS: c_int = 0;
const CUDA_ERROR_NO_DEVICE: c_int = 100;

#[cfg(windows)]
const DRIVER_LIBRARIES: &[&str] = &["nvcuda.dll"];
#[cfg(target_os = "macos")]
const DRIVER_LIBRARIES: &[&str] = &["libcuda.dylib"];
#[cfg(not(any(windows, target_os = "macos")))]
const DRIVER_LIBRARIES: &[&str] = &["libcuda.so.1", "libcuda.so"];

type CuInit = unsafe extern "C" fn(flags: c_uint) -> c_int;
type CuDeviceGetCount = unsafe extern "C" fn(count: *mut c_int) -> c_int;

#[allow(unsafe_code)]
impl DeviceDriver for CudaDriver {
    fn device_count(&self) -> std::result::Result<u32, String> {
        let driver = load_driver_runtime()?;

        // SAFETY: the signatures match the CUDA driver API declarations
        // `CUresult cuInit(unsigned int)` and `CUresult cuDeviceGetCount(int*)`.
        let symbols = unsafe {
            (
                driver.get::<CuInit>(b"cuInit\0"),
                driver.get::<CuDeviceGetCount>(b"cuDeviceGetCount\0"),
            )
        };
        let (cu_init, cu_device_get_count): (CuInit, CuDeviceGetCount) = match symbols {
            (Ok(init), Ok(count)) => (*init, *count),
            _ => {
                return Err(
                    "CUDA Driver API symbols missing (cuInit/cuDeviceGetCount)".to_string(),
                )
            }
        };

        // cuInit starts driver threads; the driver must stay mapped for the
        // rest of the process, so the handle is never closed.
        std::mem::forget(driver);

        // SAFETY: cuInit takes flags by value and must be passed 0.
        let rc = unsafe { cu_init(0) };
        if rc == CUDA_ERROR_NO_DEVICE {
            return Err(
                "no CUDA devices detected (driver present, but no GPU available)".to_string(),
            );
        }
        if rc != CUDA_SUCCESS {
            return Err(format!("cuInit failed with error code {rc}"));
        }

        let mut count: c_int = 0;
        // SAFETY: `count` is a valid, writable c_int for the duration of the call.
        let rc = unsafe { cu_device_get_count(&mut count) };
        if rc != CUDA_SUCCESS {
            return Err(format!("cuDeviceGetCount failed with error code {rc}"));
        }

        u32::try_from(count)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| "no CUDA devices detected (device count is 0)".to_string())
    }
}

#[allow(unsafe_code)]
fn load_driver_runtime() -> std::result::Result<Library, String> {
    let mut last_error = String::new();
    for name in DRIVER_LIBRARIES {
        // SAFETY: loading the vendor driver runs its initialisers, which is
        // the documented way to use it.
        match unsafe { Library::new(name) } {
            Ok(lib) => return Ok(lib),
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(format!(
        "NVIDIA driver runtime missing ({}): {last_error}",
        DRIVER_LIBRARIES[0]
    ))
}

/// A located library that the loader accepted.
#[derive(Debug)]
pub struct LoadedLibrary {
    path: PathBuf,
    handle: Library,
}

impl LoadedLibrary {
    /// Path the library was loaded from.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub(crate) fn handle(&self) -> &Library {
        &self.handle
    }
}

/// Probes the native libraries under one configuration and driver.
#[derive(Debug, Clone)]
pub struct Prober<D = CudaDriver> {
    config: SearchConfig,
    driver: D,
}

impl Prober<CudaDriver> {
    /// Prober over the current environment and the real CUDA driver.
    pub fn from_env() -> Self {
        Self::new(SearchConfig::from_env(), CudaDriver)
    }
}

impl<D: DeviceDriver> Prober<D> {
    /// Creates a prober with explicit search roots and driver.
    pub fn new(config: SearchConfig, driver: D) -> Self {
        Self { config, driver }
    }

    /// Search roots in use.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run the locator for `library`.
    pub fn locate(&self, library: NativeLibrary) -> LibraryDescriptor {
        locator::describe_with(library, &self.config)
    }

    /// Locate and load `library`, keeping the handle open.
    pub fn load(&self, library: NativeLibrary) -> Result<LoadedLibrary> {
        let backend = library.backend();
        let descriptor = self.locate(library);
        let searched = descriptor.candidates().to_vec();
        let path = descriptor
            .into_resolved()
            .ok_or_else(|| NativeError::not_found(backend, searched))?;

        match open_library(&path) {
            Ok(handle) => Ok(LoadedLibrary { path, handle }),
            Err(e) => {
                log::debug!("loader rejected {}: {}", path.display(), e);
                Err(NativeError::load_failed(backend, path, e.to_string()))
            }
        }
    }

    /// True iff `library` is located and loadable.
    pub fn built(&self, library: NativeLibrary) -> bool {
        self.built_state(library).is_built()
    }

    /// True iff the GPU library is built and a CUDA device is usable.
    pub fn runnable(&self) -> bool {
        self.runnable_state().is_runnable()
    }

    /// Load-only probe. For the CPU library "built" implies "runnable".
    pub fn built_state(&self, library: NativeLibrary) -> CapabilityState {
        match self.load(library) {
            Ok(_) => match library {
                NativeLibrary::Cpu => CapabilityState::runnable(0),
                NativeLibrary::Gpu => CapabilityState::built_only(String::new()),
            },
            Err(NativeError::BackendUnavailable {
                cause: UnavailableCause::LoadFailed { message, .. },
                ..
            }) => CapabilityState::not_built(message),
            Err(_) => CapabilityState::not_built(NOT_BUILT_REASON),
        }
    }

    /// Full GPU probe: built, driver loads and initialises, device count > 0.
    pub fn runnable_state(&self) -> CapabilityState {
        let built = self.built_state(NativeLibrary::Gpu);
        if !built.is_built() {
            return built;
        }
        let state = match self.driver.device_count() {
            Ok(count) => CapabilityState::runnable(count),
            Err(reason) => CapabilityState::built_only(reason),
        };
        log::debug!(
            "gpu probe: runnable={} devices={} reason='{}'",
            state.is_runnable(),
            state.device_count(),
            state.reason()
        );
        state
    }

    /// Capability of `library`: the runnable probe for the GPU, the built probe for the CPU.
    pub fn capability(&self, library: NativeLibrary) -> CapabilityState {
        match library {
            NativeLibrary::Gpu => self.runnable_state(),
            NativeLibrary::Cpu => self.built_state(NativeLibrary::Cpu),
        }
    }

    /// Path of `library`, or the error explaining why it is missing or unloadable.
    pub fn require_built(&self, library: NativeLibrary) -> Result<PathBuf> {
        self.load(library).map(|loaded| loaded.path)
    }

    /// Path of the GPU library, or the error explaining why it cannot run.
    pub fn require_runnable(&self) -> Result<PathBuf> {
        let path = self.require_built(NativeLibrary::Gpu)?;
        self.driver
            .device_count()
            .map(|_| path)
            .map_err(NativeError::not_runnable)
    }

    /// Ensure the resolved backend can execute, then load it.
    ///
    /// The GPU must be runnable and the CPU must be built.
    pub fn load_capable(&self, backend: ResolvedBackend) -> Result<LoadedLibrary> {
        let loaded = self.load(backend.library())?;
        if backend == ResolvedBackend::Gpu {
            self.driver.device_count().map_err(NativeError::not_runnable)?;
        }
        Ok(loaded)
    }
}

#[allow(unsafe_code)]
fn open_library(path: &std::path::Path) -> std::result::Result<Library, libloading::Error> {
    // SAFETY: loading runs the library's initialisers. The native backends
    // are trusted build artifacts located through the search roots.
    unsafe { Library::new(path) }
}

/// True iff `library` is located and loadable under the current environment.
pub fn built(library: NativeLibrary) -> bool {
    Prober::from_env().built(library)
}

/// True iff the GPU backend can run under the current environment.
pub fn runnable() -> bool {
    Prober::from_env().runnable()
}

/// Capability of `library` under the current environment.
pub fn capability(library: NativeLibrary) -> CapabilityState {
    Prober::from_env().capability(library)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[derive(Debug)]
    struct ScriptedDriver(std::result::Result<u32, String>);

    impl DeviceDriver for ScriptedDriver {
        fn device_count(&self) -> std::result::Result<u32, String> {
            self.0.clone()
        }
    }

    fn empty_prober(driver: ScriptedDriver) -> (tempfile::TempDir, Prober<ScriptedDriver>) {
        let tmp = tempfile::tempdir().unwrap();
        let config = SearchConfig::builder(tmp.path().join("pkg")).build();
        (tmp, Prober::new(config, driver))
    }

    #[test]
    fn test_capability_invariants() {
        let state = CapabilityState::not_built("missing");
        assert!(!state.is_built() && !state.is_runnable());

        let state = CapabilityState::built_only("no device");
        assert!(state.is_built() && !state.is_runnable());
        assert_eq!(state.reason(), "no device");

        let state = CapabilityState::runnable(2);
        assert!(state.is_built() && state.is_runnable());
        assert_eq!(state.device_count(), 2);
        assert!(state.reason().is_empty());
    }

    #[test]
    fn test_missing_library_is_not_built() {
        let (_tmp, prober) = empty_prober(ScriptedDriver(Ok(4)));
        let state = prober.capability(NativeLibrary::Gpu);
        assert!(!state.is_built());
        assert!(!state.is_runnable());
        assert_eq!(state.reason(), NOT_BUILT_REASON);
        assert!(!prober.built(NativeLibrary::Cpu));
    }

    #[test]
    fn test_runnable_requires_built_even_with_devices() {
        let (_tmp, prober) = empty_prober(ScriptedDriver(Ok(8)));
        assert!(!prober.runnable());
        let err = prober.require_runnable().unwrap_err();
        assert!(matches!(
            err,
            NativeError::BackendUnavailable {
                cause: UnavailableCause::NotFound { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_unloadable_file_reports_loader_message() {
        let tmp = tempfile::tempdir().unwrap();
        let lib_dir = tmp.path().join("pkg").join("lib");
        fs::create_dir_all(&lib_dir).unwrap();
        fs::write(lib_dir.join(NativeLibrary::Cpu.file_name()), b"not a shared object").unwrap();

        let config = SearchConfig::builder(tmp.path().join("pkg")).build();
        let prober = Prober::new(config, ScriptedDriver(Ok(1)));

        let state = prober.capability(NativeLibrary::Cpu);
        assert!(!state.is_built());
        assert!(!state.reason().is_empty());
        assert_ne!(state.reason(), NOT_BUILT_REASON);

        let err = prober.require_built(NativeLibrary::Cpu).unwrap_err();
        assert!(err.to_string().contains("could not be loaded"));
    }

    #[test]
    fn test_probing_is_idempotent() {
        let (_tmp, prober) = empty_prober(ScriptedDriver(Err("driver missing".into())));
        let first = (prober.capability(NativeLibrary::Gpu), prober.capability(NativeLibrary::Cpu));
        let second = (prober.capability(NativeLibrary::Gpu), prober.capability(NativeLibrary::Cpu));
        assert_eq!(first, second);
    }

    #[test]
    fn test_repeated_driver_probes_agree() {
        // The driver stays loaded after the first query; later ones must see it unchanged.
        let first = CudaDriver.device_count();
        for _ in 0..3 {
            assert_eq!(CudaDriver.device_count(), first);
        }
    }

    #[test]
    fn test_real_driver_probe_does_not_panic() {
        // Whatever the host has, the probe must answer without panicking.
        match CudaDriver.device_count() {
            Ok(n) => assert!(n > 0),
            Err(reason) => assert!(!reason.is_empty()),
        }
    }
}
