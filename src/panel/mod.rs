//! Panel data: a collection of (possibly multivariate) time series.
//!
//! A panel is held either as a nested [`Frame`] (one row per instance, one
//! column per variable, one series per cell) or as a 3D array of shape
//! `(N, D, T)`. [`convert`] moves between these forms and the flat tabular
//! form; [`validation`] checks and coerces inputs for the adapters.

pub mod convert;
pub mod frame;
pub mod validation;

pub use convert::{
    array3_to_nested, array3_to_tabular, nested_to_array3, nested_to_tabular,
    nested_to_tabular_frame, tabular_to_nested,
};
pub use frame::{Column, Frame};
pub use validation::{check_array, check_frame, check_panel, CheckConfig};

use ndarray::Array3;

/// Panel input accepted by every [`PanelTransformer`](crate::traits::PanelTransformer).
#[derive(Clone, Debug, PartialEq)]
pub enum Panel {
    /// Nested form.
    Frame(Frame),
    /// `(N, D, T)` array form.
    Array(Array3<f64>),
}

impl Panel {
    /// Number of instances `N`.
    pub fn n_instances(&self) -> usize {
        match self {
            Panel::Frame(frame) => frame.n_rows(),
            Panel::Array(data) => data.dim().0,
        }
    }

    /// Number of variables `D`.
    pub fn n_columns(&self) -> usize {
        match self {
            Panel::Frame(frame) => frame.n_columns(),
            Panel::Array(data) => data.dim().1,
        }
    }
}

impl From<Frame> for Panel {
    fn from(frame: Frame) -> Self {
        Panel::Frame(frame)
    }
}

impl From<Array3<f64>> for Panel {
    fn from(data: Array3<f64>) -> Self {
        Panel::Array(data)
    }
}
