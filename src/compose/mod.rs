//! Meta-transformers built from other transformers.
//!
//! - [`ColumnTransformer`]: route column subsets to different transformers
//!   and stack the results.
//! - [`ColumnConcatenator`]: turn a multivariate panel into a univariate one.
//! - [`SeriesToPrimitivesRowTransformer`] / [`SeriesToSeriesRowTransformer`]:
//!   apply a single-series transformer to every instance, with
//!   [`make_row_transformer`] choosing the variant.
//! - [`FunctionTransformer`] / [`SeriesFunctionTransformer`]: stateless
//!   transformers from closures.

pub mod column_transformer;
pub mod concatenator;
pub mod function;
pub mod row_transformer;

pub use column_transformer::{
    ColumnSpec, ColumnTransformer, ColumnTransformerConfig, FittedEntry, TransformerStep,
    REMAINDER,
};
pub use concatenator::ColumnConcatenator;
pub use function::{FunctionTransformer, SeriesFunctionTransformer};
pub use row_transformer::{
    make_row_transformer, resolve_row_capability, RowTransformer, RowTransformerConfig,
    SeriesToPrimitivesRowTransformer, SeriesToSeriesRowTransformer,
};
