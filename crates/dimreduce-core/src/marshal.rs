//! Call marshalling: from a validated input to populated output buffers.
//!
//! A call moves through `REQUESTED → RESOLVED → LOADED → INVOKED → POPULATED`.
//! Capability and load failures are raised before any output buffer is
//! allocated, so an error never leaves partially populated buffers behind.
//! Nothing is retained between calls.
//!
//! # Thread safety
//!
//! The marshaller holds no shared mutable state and each call owns its
//! buffers. Whether a native library may be entered concurrently from several
//! threads is a property of that library; callers that need it must check.
//! The native call blocks and cannot be cancelled or timed out.

use nalgebra::DMatrix;

use crate::buffers::{effective_rank, DecompositionBuffers};
use crate::error::{NativeError, Result};
use crate::matrix::MatrixView;
use crate::params::{DecompositionParams, MarshalledParams, RawParams};
use crate::probe::{DeviceDriver, LoadedLibrary, Prober};
use crate::types::{BackendRequest, DecompositionKind, ResolvedBackend};

/// `truncated_svd_float(X, Q, w, U, X_transformed, explained_variance, explained_variance_ratio, params)`
pub type TruncatedSvdFn = unsafe extern "C" fn(
    x: *const f32,
    components: *mut f32,
    singular_values: *mut f32,
    left_factors: *mut f32,
    transformed: *mut f32,
    explained_variance: *mut f32,
    explained_variance_ratio: *mut f32,
    params: RawParams,
);

/// `pca_float(X, Q, w, U, X_transformed, explained_variance, explained_variance_ratio, mean, params)`
pub type PcaFn = unsafe extern "C" fn(
    x: *const f32,
    components: *mut f32,
    singular_values: *mut f32,
    left_factors: *mut f32,
    transformed: *mut f32,
    explained_variance: *mut f32,
    explained_variance_ratio: *mut f32,
    mean: *mut f32,
    params: RawParams,
);

/// A resolved native entry point.
#[derive(Debug, Clone, Copy)]
pub enum EntryPoint {
    /// `pca_float`
    Pca(PcaFn),
    /// `truncated_svd_float`
    TruncatedSvd(TruncatedSvdFn),
}

impl EntryPoint {
    /// Kind of decomposition this entry point performs.
    pub fn kind(&self) -> DecompositionKind {
        match self {
            Self::Pca(_) => DecompositionKind::Pca,
            Self::TruncatedSvd(_) => DecompositionKind::TruncatedSvd,
        }
    }

    /// Look up the entry point for `kind` in a loaded library.
    #[allow(unsafe_code)]
    fn resolve(
        library: &LoadedLibrary,
        backend: ResolvedBackend,
        kind: DecompositionKind,
    ) -> Result<Self> {
        let handle = library.handle();
        let missing = |e: libloading::Error| {
            NativeError::symbol_missing(backend, kind.symbol_name(), e.to_string())
        };
        // SAFETY: the function pointer types mirror the exported C
        // declarations; the pointer is only called while `library` is alive.
        unsafe {
            match kind {
                DecompositionKind::Pca => handle
                    .get::<PcaFn>(kind.symbol())
                    .map(|sym| Self::Pca(*sym))
                    .map_err(missing),
                DecompositionKind::TruncatedSvd => handle
                    .get::<TruncatedSvdFn>(kind.symbol())
                    .map(|sym| Self::TruncatedSvd(*sym))
                    .map_err(missing),
            }
        }
    }
}

/// Populate `buffers` by calling `entry` on `x`.
///
/// # Safety
///
/// `entry` must point to a live function with the declared C signature, and
/// `buffers` must have been sized by [`DecompositionBuffers::zeroed`] for
/// `entry.kind()` with the same rows, cols and k as `params`.
#[allow(unsafe_code)]
pub(crate) unsafe fn call_entry(
    entry: EntryPoint,
    x: &MatrixView<'_>,
    params: &MarshalledParams,
    buffers: &mut DecompositionBuffers,
) {
    let raw = params.raw();
    debug_assert_eq!(usize::try_from(raw.rows).ok(), Some(x.rows()));
    debug_assert_eq!(usize::try_from(raw.cols).ok(), Some(x.cols()));
    debug_assert_eq!(usize::try_from(raw.k).ok(), Some(buffers.k()));
    debug_assert_eq!(entry.kind() == DecompositionKind::Pca, buffers.mean.is_some());

    let x_ptr = x.as_slice().as_ptr();
    match entry {
        EntryPoint::TruncatedSvd(f) => f(
            x_ptr,
            buffers.components.as_mut_ptr(),
            buffers.singular_values.as_mut_ptr(),
            buffers.left_factors.as_mut_ptr(),
            buffers.transformed.as_mut_ptr(),
            buffers.explained_variance.as_mut_ptr(),
            buffers.explained_variance_ratio.as_mut_ptr(),
            raw,
        ),
        EntryPoint::Pca(f) => {
            let mean = buffers
                .mean
                .as_mut()
                .map_or(std::ptr::null_mut(), Vec::as_mut_ptr);
            f(
                x_ptr,
                buffers.components.as_mut_ptr(),
                buffers.singular_values.as_mut_ptr(),
                buffers.left_factors.as_mut_ptr(),
                buffers.transformed.as_mut_ptr(),
                buffers.explained_variance.as_mut_ptr(),
                buffers.explained_variance_ratio.as_mut_ptr(),
                mean,
                raw,
            );
        }
    }
}

/// Outputs of a completed call plus the metadata needed to use them.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedDecomposition {
    kind: DecompositionKind,
    backend: ResolvedBackend,
    requested_k: usize,
    buffers: DecompositionBuffers,
}

impl FittedDecomposition {
    /// Wrap populated buffers.
    pub fn new(
        kind: DecompositionKind,
        backend: ResolvedBackend,
        requested_k: usize,
        buffers: DecompositionBuffers,
    ) -> Self {
        Self {
            kind,
            backend,
            requested_k,
            buffers,
        }
    }

    /// Decomposition that produced these outputs.
    pub fn kind(&self) -> DecompositionKind {
        self.kind
    }

    /// Backend that produced these outputs.
    pub fn backend(&self) -> ResolvedBackend {
        self.backend
    }

    /// Rank the caller asked for.
    pub fn requested_k(&self) -> usize {
        self.requested_k
    }

    /// Rank actually computed.
    pub fn k(&self) -> usize {
        self.buffers.k()
    }

    /// True when the requested rank was reduced to fit the input shape.
    pub fn rank_was_clamped(&self) -> bool {
        self.k() < self.requested_k
    }

    /// Raw buffers.
    pub fn buffers(&self) -> &DecompositionBuffers {
        &self.buffers
    }

    /// Take ownership of the raw buffers.
    pub fn into_buffers(self) -> DecompositionBuffers {
        self.buffers
    }

    /// Components as a `k × cols` matrix.
    pub fn components(&self) -> DMatrix<f32> {
        DMatrix::from_row_slice(self.k(), self.buffers.cols(), &self.buffers.components)
    }

    /// Projected input as a `rows × k` matrix.
    pub fn transformed(&self) -> DMatrix<f32> {
        DMatrix::from_row_slice(self.buffers.rows(), self.k(), &self.buffers.transformed)
    }

    /// Left singular vectors as a `rows × k` matrix.
    pub fn left_factors(&self) -> DMatrix<f32> {
        DMatrix::from_row_slice(self.buffers.rows(), self.k(), &self.buffers.left_factors)
    }

    /// Singular values.
    pub fn singular_values(&self) -> &[f32] {
        &self.buffers.singular_values
    }

    /// Explained variance per component.
    pub fn explained_variance(&self) -> &[f32] {
        &self.buffers.explained_variance
    }

    /// Explained variance ratio per component.
    pub fn explained_variance_ratio(&self) -> &[f32] {
        &self.buffers.explained_variance_ratio
    }

    /// Feature means (PCA only).
    pub fn mean(&self) -> Option<&[f32]> {
        self.buffers.mean.as_deref()
    }

    /// Project new rows onto the stored components: `x · componentsᵀ`.
    ///
    /// Runs entirely on the host; the native library is not involved.
    pub fn transform(&self, x: &MatrixView<'_>) -> Result<DMatrix<f32>> {
        if x.cols() != self.buffers.cols() {
            return Err(NativeError::invalid_input(format!(
                "expected {} columns, got {}",
                self.buffers.cols(),
                x.cols()
            )));
        }
        Ok(x.to_dmatrix() * self.components().transpose())
    }
}

impl<D: DeviceDriver> Prober<D> {
    /// Run `kind` on `x` with an already resolved backend.
    ///
    /// Fails with [`NativeError::BackendUnavailable`] when the backend is not
    /// capable (GPU: runnable, CPU: built), when the library cannot be loaded,
    /// or when the entry point is missing. All of these are checked before
    /// the output buffers are allocated.
    #[allow(unsafe_code)]
    pub fn invoke(
        &self,
        backend: ResolvedBackend,
        kind: DecompositionKind,
        x: &MatrixView<'_>,
        params: &DecompositionParams,
    ) -> Result<FittedDecomposition> {
        let (rows, cols) = x.shape();
        let k = effective_rank(params.n_components, rows, cols);
        if k < params.n_components {
            log::debug!(
                "n_components={} clamped to {} for input of shape ({}, {})",
                params.n_components,
                k,
                rows,
                cols
            );
        }

        let mut marshalled = MarshalledParams::new(params, rows, cols, k)?;
        if kind == DecompositionKind::TruncatedSvd {
            marshalled.set_whiten(false);
        }

        let library = self.load_capable(backend)?;
        let entry = EntryPoint::resolve(&library, backend, kind)?;

        let mut buffers = DecompositionBuffers::zeroed(kind, rows, cols, k);
        log::info!(
            "calling {} on {} backend ({} x {}, k={}) from {}",
            kind.symbol_name(),
            backend,
            rows,
            cols,
            k,
            library.path().display()
        );
        // SAFETY: `entry` was resolved from `library`, which outlives the
        // call; buffers and params were sized from the same (rows, cols, k).
        unsafe { call_entry(entry, x, &marshalled, &mut buffers) };
        drop(library);

        Ok(FittedDecomposition::new(kind, backend, params.n_components, buffers))
    }

    /// Resolve `request`, then [`invoke`](Self::invoke).
    pub fn decompose(
        &self,
        request: BackendRequest,
        kind: DecompositionKind,
        x: &MatrixView<'_>,
        params: &DecompositionParams,
    ) -> Result<FittedDecomposition> {
        let backend = self.select_backend(request);
        self.invoke(backend, kind, x, params)
    }
}

/// Run `kind` on `x` with a resolved backend under the current environment.
pub fn invoke(
    backend: ResolvedBackend,
    kind: DecompositionKind,
    x: &MatrixView<'_>,
    params: &DecompositionParams,
) -> Result<FittedDecomposition> {
    Prober::from_env().invoke(backend, kind, x, params)
}

/// Select a backend for `request` and run `kind` on `x` under the current environment.
pub fn decompose(
    request: BackendRequest,
    kind: DecompositionKind,
    x: &MatrixView<'_>,
    params: &DecompositionParams,
) -> Result<FittedDecomposition> {
    Prober::from_env().decompose(request, kind, x, params)
}
