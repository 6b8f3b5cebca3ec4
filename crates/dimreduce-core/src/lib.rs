//! Native backend resolution and dispatch for PCA and truncated SVD.
//!
//! The numerical work lives in two prebuilt shared libraries, one for CUDA
//! GPUs (`libdimreduce4gpu`) and one for the CPU (`libdimreduce4cpu`). This
//! crate finds them, decides whether the current environment can use them,
//! picks a backend for each call and marshals data across the C boundary.
//!
//! # Modules
//!
//! - [`config`]: search roots and environment overrides
//! - [`locator`]: ordered candidate search for a library file
//! - [`probe`]: built and runnable capability checks
//! - [`select`]: pure backend selection policy
//! - [`params`]: decomposition parameters and their fixed native layout
//! - [`matrix`]: validated row-major `f32` input
//! - [`buffers`]: zero-filled output buffers and rank clamping
//! - [`marshal`]: entry-point resolution and the native call
//! - [`diagnostics`]: availability report for tooling
//! - [`error`]: error types
//! - [`types`]: library, backend and decomposition identifiers
//!
//! # Example
//!
//! ```no_run
//! use dimreduce_core::prelude::*;
//!
//! let x = MatrixView::from_rows(&[[1.0_f32, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 10.0]])?;
//! let params = DecompositionParams::builder(DecompositionKind::Pca)
//!     .n_components(2)
//!     .random_state(0)
//!     .build();
//! let fitted = decompose(BackendRequest::Auto, DecompositionKind::Pca, &x, &params)?;
//! println!("{} via {}", fitted.components(), fitted.backend());
//! # Ok::<(), dimreduce_core::NativeError>(())
//! ```

pub mod buffers;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod locator;
pub mod marshal;
pub mod matrix;
pub mod params;
pub mod probe;
pub mod select;
pub mod types;

pub use error::{NativeError, Result, UnavailableCause};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use dimreduce_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::buffers::{effective_rank, DecompositionBuffers};
    pub use crate::config::SearchConfig;
    pub use crate::diagnostics::{report, report_all, DiagnosticsReport, ExtendedReport};
    pub use crate::error::{NativeError, Result, UnavailableCause};
    pub use crate::locator::{locate, LibraryDescriptor};
    pub use crate::marshal::{decompose, invoke, FittedDecomposition};
    pub use crate::matrix::MatrixView;
    pub use crate::params::DecompositionParams;
    pub use crate::probe::{built, capability, runnable, CapabilityState, DeviceDriver, Prober};
    pub use crate::select::{select, select_backend};
    pub use crate::types::{
        Algorithm, BackendRequest, DecompositionKind, NativeLibrary, ResolvedBackend,
    };
}
