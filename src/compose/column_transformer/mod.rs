//! ColumnTransformer for applying different transformers to different columns
//! of a panel.
//!
//! This module provides the `ColumnTransformer`, which routes column subsets
//! to their own transformers (or the `passthrough` / `drop` sentinels) and
//! stacks the results as a sparse matrix, a frame or a dense array.

#[allow(clippy::module_inception)]
mod column_transformer;
mod stacking;

pub use column_transformer::{
    ColumnSpec, ColumnTransformer, ColumnTransformerConfig, FittedEntry, TransformerStep,
    REMAINDER,
};
