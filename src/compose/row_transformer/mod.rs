//! Row broadcasters: apply a single-series transformer to every instance of a
//! panel.
//!
//! The template is cloned once per instance and fitted on that instance
//! alone, so nothing learned on one instance leaks into another.
//! [`SeriesToPrimitivesRowTransformer`] turns the panel into a table,
//! [`SeriesToSeriesRowTransformer`] into another panel, and
//! [`make_row_transformer`] picks between them from the template's declared
//! capability.

#[allow(clippy::module_inception)]
mod row_transformer;

pub use row_transformer::{
    make_row_transformer, resolve_row_capability, RowTransformer, RowTransformerConfig,
    SeriesToPrimitivesRowTransformer, SeriesToSeriesRowTransformer,
};
