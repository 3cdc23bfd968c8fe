//! # panel-compose
//!
//! Composable meta-transformers for panel data: collections of (possibly
//! multivariate) time series, one series per instance and variable.
//!
//! ## Core Design Principles
//!
//! - **One transformer trait**: every adapter implements [`PanelTransformer`],
//!   so adapters nest freely (a `ColumnTransformer` entry can itself be a
//!   `ColumnTransformer` or a row broadcaster).
//! - **Explicit capabilities**: series transformers declare whether they
//!   produce series or primitives; broadcasters check the declaration once, at
//!   construction.
//! - **Shape-aware stacking**: column-routed outputs are recombined as a
//!   sparse matrix, a frame or a dense array depending on what the entries
//!   return.
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::Array3;
//! use panel_compose::{ColumnConcatenator, ColumnTransformer, Panel, PanelTransformer};
//!
//! // 4 instances, 2 variables, 10 time points.
//! let panel = Panel::from(Array3::<f64>::zeros((4, 2, 10)));
//!
//! let mut ct = ColumnTransformer::new()
//!     .add("concat", ColumnConcatenator::new(), vec!["var_0", "var_1"]);
//! let out = ct.fit_transform(&panel).unwrap();
//! assert_eq!(out.n_rows(), 4);
//! assert_eq!(out.n_columns(), Some(1));
//! ```
//!
//! ## Module Structure
//!
//! - `panel` — Nested frames, the `Panel` input type, conversions and validation
//! - `output` — The `Transformed` output container and the CSR matrix
//! - `traits` — `PanelTransformer`, `SeriesTransformer`, `Estimator`
//! - `compose` — Column router, concatenator, row broadcasters, function transformers
//! - `error` — The `ComposeError` type
//!
//! ## Features
//!
//! - `parallel` (default): run `ColumnTransformer` entries on a rayon pool when
//!   `n_jobs != 1`.

/// Meta-transformers built from other transformers.
pub mod compose;

/// Error types.
pub mod error;

/// Transformer outputs.
pub mod output;

/// Panel data containers, conversions and validation.
pub mod panel;

/// Transformer and estimator traits.
pub mod traits;

pub use compose::{
    make_row_transformer, resolve_row_capability, ColumnConcatenator, ColumnSpec,
    ColumnTransformer, ColumnTransformerConfig, FittedEntry, FunctionTransformer, RowTransformer,
    RowTransformerConfig, SeriesFunctionTransformer, SeriesToPrimitivesRowTransformer,
    SeriesToSeriesRowTransformer, TransformerStep,
};
pub use error::{ComposeError, Result};
pub use output::{CsrMatrix, Transformed};
pub use panel::{Column, Frame, Panel};
pub use traits::{
    Estimator, PanelScitype, PanelTransformer, SeriesCapability, SeriesOutput, SeriesTransformer,
};
