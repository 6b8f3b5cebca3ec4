//! Decomposition parameters and their fixed native layout.
//!
//! [`DecompositionParams`] is the owned, validated description of a call.
//! [`RawParams`] is the exact record passed by value to `pca_float` and
//! `truncated_svd_float`:
//!
//! ```text
//! struct params {
//!   int32_t X_n;          int32_t X_m;      int32_t k;
//!   const char* algorithm;
//!   int32_t n_iter;       int32_t random_state;
//!   float tol;            int32_t verbose;  int32_t gpu_id;
//!   bool whiten;
//! };
//! ```
//!
//! Field order and widths must match the native headers byte for byte. The
//! layout is asserted at compile time below; a mismatch with the compiled
//! native library is not detectable at runtime.

use std::ffi::{c_char, CStr, CString};
use std::mem::{align_of, offset_of, size_of};

use rand::Rng;

use crate::error::{NativeError, Result};
use crate::types::{Algorithm, DecompositionKind};

/// Exclusive upper bound for generated seeds, matching `2^31 - 1`.
pub const SEED_UPPER_BOUND: i32 = i32::MAX;

/// Parameters for one decomposition call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecompositionParams {
    /// Requested number of components (clamped to the input shape at call time).
    pub n_components: usize,
    /// Solver requested from the native library.
    pub algorithm: Algorithm,
    /// Power-iteration count.
    pub n_iter: i32,
    /// Seed; a fresh one is drawn per call when absent.
    pub random_state: Option<i32>,
    /// Convergence tolerance.
    pub tol: f32,
    /// Ask the native library to log progress.
    pub verbose: bool,
    /// CUDA device ordinal (ignored by the CPU library).
    pub gpu_id: i32,
    /// Scale PCA outputs to unit variance (ignored by truncated SVD).
    pub whiten: bool,
}

impl DecompositionParams {
    /// Default parameters for `kind`.
    pub fn for_kind(kind: DecompositionKind) -> Self {
        Self {
            n_components: 2,
            algorithm: kind.default_algorithm(),
            n_iter: 5,
            random_state: None,
            tol: 1e-5,
            verbose: false,
            gpu_id: 0,
            whiten: false,
        }
    }

    /// Builder seeded with the defaults for `kind`.
    pub fn builder(kind: DecompositionKind) -> DecompositionParamsBuilder {
        DecompositionParamsBuilder {
            params: Self::for_kind(kind),
        }
    }

    /// Seed to send across the boundary, drawing one if unset.
    pub fn resolve_seed(&self) -> i32 {
        self.random_state
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..SEED_UPPER_BOUND))
    }
}

/// Builder for [`DecompositionParams`].
#[derive(Debug, Clone)]
pub struct DecompositionParamsBuilder {
    params: DecompositionParams,
}

impl DecompositionParamsBuilder {
    /// Set the requested number of components.
    pub fn n_components(mut self, n: usize) -> Self {
        self.params.n_components = n;
        self
    }

    /// Set the solver.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.params.algorithm = algorithm;
        self
    }

    /// Set the power-iteration count.
    pub fn n_iter(mut self, n_iter: i32) -> Self {
        self.params.n_iter = n_iter;
        self
    }

    /// Fix the seed.
    pub fn random_state(mut self, seed: i32) -> Self {
        self.params.random_state = Some(seed);
        self
    }

    /// Set the convergence tolerance.
    pub fn tol(mut self, tol: f32) -> Self {
        self.params.tol = tol;
        self
    }

    /// Enable native progress logging.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.params.verbose = verbose;
        self
    }

    /// Set the CUDA device ordinal.
    pub fn gpu_id(mut self, gpu_id: i32) -> Self {
        self.params.gpu_id = gpu_id;
        self
    }

    /// Enable whitening (PCA only).
    pub fn whiten(mut self, whiten: bool) -> Self {
        self.params.whiten = whiten;
        self
    }

    /// Build the parameters.
    pub fn build(self) -> DecompositionParams {
        self.params
    }
}

/// The `params` record as laid out by the native libraries.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawParams {
    /// Rows of the input (`X_n`).
    pub rows: i32,
    /// Columns of the input (`X_m`).
    pub cols: i32,
    /// Effective rank.
    pub k: i32,
    /// NUL-terminated algorithm name, borrowed for the duration of the call.
    pub algorithm: *const c_char,
    /// Power-iteration count.
    pub n_iter: i32,
    /// Seed.
    pub random_state: i32,
    /// Convergence tolerance.
    pub tol: f32,
    /// 0 or 1.
    pub verbose: i32,
    /// CUDA device ordinal.
    pub gpu_id: i32,
    /// One byte followed by tail padding.
    pub whiten: bool,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(offset_of!(RawParams, rows) == 0);
    assert!(offset_of!(RawParams, cols) == 4);
    assert!(offset_of!(RawParams, k) == 8);
    assert!(offset_of!(RawParams, algorithm) == 16);
    assert!(offset_of!(RawParams, n_iter) == 24);
    assert!(offset_of!(RawParams, random_state) == 28);
    assert!(offset_of!(RawParams, tol) == 32);
    assert!(offset_of!(RawParams, verbose) == 36);
    assert!(offset_of!(RawParams, gpu_id) == 40);
    assert!(offset_of!(RawParams, whiten) == 44);
    assert!(size_of::<RawParams>() == 48);
    assert!(align_of::<RawParams>() == 8);
};

#[cfg(target_pointer_width = "32")]
const _: () = {
    assert!(offset_of!(RawParams, rows) == 0);
    assert!(offset_of!(RawParams, cols) == 4);
    assert!(offset_of!(RawParams, k) == 8);
    assert!(offset_of!(RawParams, algorithm) == 12);
    assert!(offset_of!(RawParams, n_iter) == 16);
    assert!(offset_of!(RawParams, random_state) == 20);
    assert!(offset_of!(RawParams, tol) == 24);
    assert!(offset_of!(RawParams, verbose) == 28);
    assert!(offset_of!(RawParams, gpu_id) == 32);
    assert!(offset_of!(RawParams, whiten) == 36);
    assert!(size_of::<RawParams>() == 40);
    assert!(align_of::<RawParams>() == 4);
};

const _: () = assert!(size_of::<bool>() == 1);

/// A [`RawParams`] together with the string it points into.
///
/// The record borrows `algorithm` by raw pointer, so the pair travels
/// together and the pointer stays valid for as long as this value lives.
#[derive(Debug)]
pub struct MarshalledParams {
    raw: RawParams,
    algorithm: CString,
}

impl MarshalledParams {
    /// Build the native record for an input of `rows × cols` and effective rank `k`.
    pub fn new(params: &DecompositionParams, rows: usize, cols: usize, k: usize) -> Result<Self> {
        let algorithm = CString::new(params.algorithm.as_str())
            .map_err(|e| NativeError::invalid_input(format!("algorithm name: {e}")))?;
        let raw = RawParams {
            rows: to_i32("rows", rows)?,
            cols: to_i32("cols", cols)?,
            k: to_i32("k", k)?,
            algorithm: algorithm.as_ptr(),
            n_iter: params.n_iter,
            random_state: params.resolve_seed(),
            tol: params.tol,
            verbose: i32::from(params.verbose),
            gpu_id: params.gpu_id,
            whiten: params.whiten,
        };
        Ok(Self { raw, algorithm })
    }

    /// Copy of the record to pass by value.
    pub fn raw(&self) -> RawParams {
        self.raw
    }

    /// Algorithm string referenced by the record.
    pub fn algorithm(&self) -> &CStr {
        &self.algorithm
    }

    /// Override `whiten` (truncated SVD always sends false).
    pub(crate) fn set_whiten(&mut self, whiten: bool) {
        self.raw.whiten = whiten;
    }
}

fn to_i32(name: &str, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        NativeError::invalid_input(format!("{name} = {value} exceeds the native int32 limit"))
    })
}
