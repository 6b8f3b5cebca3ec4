//! Backend selection policy.
//!
//! [`select`] is a pure function of the request and the two capability
//! states. Explicit requests are honoured as-is so that an incapable backend
//! fails loudly in the marshaller instead of being swapped for the other one.
//! `Auto` prefers a runnable GPU, then a built CPU, and otherwise resolves to
//! the GPU so that the resulting error describes the primary backend.

use crate::probe::{CapabilityState, DeviceDriver, Prober};
use crate::types::{BackendRequest, NativeLibrary, ResolvedBackend};

/// Resolve `requested` against the given capability states.
pub fn select(
    requested: BackendRequest,
    gpu: &CapabilityState,
    cpu: &CapabilityState,
) -> ResolvedBackend {
    match requested {
        BackendRequest::Gpu => ResolvedBackend::Gpu,
        BackendRequest::Cpu => ResolvedBackend::Cpu,
        BackendRequest::Auto => {
            if gpu.is_runnable() {
                ResolvedBackend::Gpu
            } else if cpu.is_built() {
                ResolvedBackend::Cpu
            } else {
                ResolvedBackend::Gpu
            }
        }
    }
}

impl<D: DeviceDriver> Prober<D> {
    /// Probe as needed and resolve `requested`.
    ///
    /// Explicit requests skip probing entirely.
    pub fn select_backend(&self, requested: BackendRequest) -> ResolvedBackend {
        let resolved = match requested {
            BackendRequest::Gpu => ResolvedBackend::Gpu,
            BackendRequest::Cpu => ResolvedBackend::Cpu,
            BackendRequest::Auto => {
                let gpu = self.capability(NativeLibrary::Gpu);
                // The CPU probe is only needed when the GPU cannot run.
                let cpu = if gpu.is_runnable() {
                    CapabilityState::default()
                } else {
                    self.capability(NativeLibrary::Cpu)
                };
                select(requested, &gpu, &cpu)
            }
        };
        log::debug!("backend request '{}' resolved to '{}'", requested, resolved);
        resolved
    }
}

/// Resolve `requested` against the current environment.
pub fn select_backend(requested: BackendRequest) -> ResolvedBackend {
    Prober::from_env().select_backend(requested)
}
