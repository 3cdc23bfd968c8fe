//! Output container returned by every panel transformer.

pub mod sparse;

pub use sparse::CsrMatrix;

use crate::error::{ComposeError, Result};
use crate::panel::{Column, Frame};
use ndarray::{Array2, ArrayD, Ix2};

/// Result of [`PanelTransformer::transform`](crate::traits::PanelTransformer::transform).
///
/// `Dense` keeps its dimensionality dynamic so that a misbehaving transformer
/// returning 1D or 3D output can be reported instead of silently reshaped.
#[derive(Clone, Debug, PartialEq)]
pub enum Transformed {
    Dense(ArrayD<f64>),
    Sparse(CsrMatrix),
    Frame(Frame),
    /// A single named column.
    Series { name: String, values: Column },
}

impl Transformed {
    /// Wrap a 2D array.
    pub fn dense(data: Array2<f64>) -> Self {
        Transformed::Dense(data.into_dyn())
    }

    /// Number of rows (first axis length).
    pub fn n_rows(&self) -> usize {
        match self {
            Transformed::Dense(data) => data.shape().first().copied().unwrap_or(1),
            Transformed::Sparse(matrix) => matrix.nrows(),
            Transformed::Frame(frame) => frame.n_rows(),
            Transformed::Series { values, .. } => values.len(),
        }
    }

    /// Number of columns contributed when stacked, `None` when not 2D.
    pub fn n_columns(&self) -> Option<usize> {
        match self {
            Transformed::Dense(data) if data.ndim() == 2 => Some(data.shape()[1]),
            Transformed::Dense(_) => None,
            Transformed::Sparse(matrix) => Some(matrix.ncols()),
            Transformed::Frame(frame) => Some(frame.n_columns()),
            Transformed::Series { .. } => Some(1),
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            Transformed::Dense(data) => data.ndim(),
            Transformed::Series { .. } => 1,
            Transformed::Sparse(_) | Transformed::Frame(_) => 2,
        }
    }

    /// Whether the output can be stacked column-wise: anything 2D, or a
    /// series (which counts as one column).
    pub fn is_tabular(&self) -> bool {
        self.n_columns().is_some()
    }

    /// Number of cells.
    pub fn size(&self) -> usize {
        match self {
            Transformed::Dense(data) => data.len(),
            Transformed::Sparse(matrix) => matrix.nrows() * matrix.ncols(),
            Transformed::Frame(frame) => frame.n_rows() * frame.n_columns(),
            Transformed::Series { values, .. } => values.len(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Transformed::Sparse(_))
    }

    /// Frame-like outputs are kept as frames when the router preserves them.
    pub fn is_frame_like(&self) -> bool {
        matches!(self, Transformed::Frame(_) | Transformed::Series { .. })
    }

    /// Multiply every value by `weight`.
    pub fn scale(&self, weight: f64) -> Self {
        match self {
            Transformed::Dense(data) => Transformed::Dense(data * weight),
            Transformed::Sparse(matrix) => Transformed::Sparse(matrix.scale(weight)),
            Transformed::Frame(frame) => Transformed::Frame(frame.scale(weight)),
            Transformed::Series { name, values } => Transformed::Series {
                name: name.clone(),
                values: values.scale(weight),
            },
        }
    }

    /// View the output as a 2D numeric array.
    ///
    /// # Errors
    /// Returns [`ComposeError::NonTabularOutput`] for dense output that is not
    /// 2D and [`ComposeError::UnsupportedData`] when nested series are present.
    pub fn to_array2(&self) -> Result<Array2<f64>> {
        match self {
            Transformed::Dense(data) => data
                .view()
                .into_dimensionality::<Ix2>()
                .map(|view| view.to_owned())
                .map_err(|_| ComposeError::NonTabularOutput {
                    name: "dense".to_string(),
                    ndim: data.ndim(),
                }),
            Transformed::Sparse(matrix) => Ok(matrix.to_dense()),
            Transformed::Frame(frame) => frame.to_array(),
            Transformed::Series { name, values } => match values {
                Column::Primitive(v) => Ok(v.clone().insert_axis(ndarray::Axis(1))),
                Column::Nested(_) => Err(ComposeError::UnsupportedData(format!(
                    "series '{}' holds nested series and cannot be converted to a numeric array",
                    name
                ))),
            },
        }
    }

    /// Convert to a CSR matrix (dense blocks are compressed).
    pub fn to_csr(&self) -> Result<CsrMatrix> {
        match self {
            Transformed::Sparse(matrix) => Ok(matrix.clone()),
            other => Ok(CsrMatrix::from_dense(&other.to_array2()?)),
        }
    }

    /// Convert to a frame. Array columns are named `{prefix}__{j}`; a series
    /// keeps its own name.
    pub fn to_frame(&self, prefix: &str) -> Result<Frame> {
        match self {
            Transformed::Frame(frame) => Ok(frame.clone()),
            Transformed::Series { name, values } => {
                let mut frame = Frame::with_rows(values.len());
                frame.push_column(name.clone(), values.clone())?;
                Ok(frame)
            }
            other => {
                let data = other.to_array2()?;
                let names = (0..data.ncols())
                    .map(|j| format!("{}__{}", prefix, j))
                    .collect();
                Frame::from_array(&data, Some(names))
            }
        }
    }

    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            Transformed::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Transformed::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_sparse(&self) -> Option<&CsrMatrix> {
        match self {
            Transformed::Sparse(matrix) => Some(matrix),
            _ => None,
        }
    }
}

impl From<Array2<f64>> for Transformed {
    fn from(data: Array2<f64>) -> Self {
        Transformed::dense(data)
    }
}

impl From<Frame> for Transformed {
    fn from(frame: Frame) -> Self {
        Transformed::Frame(frame)
    }
}

impl From<CsrMatrix> for Transformed {
    fn from(matrix: CsrMatrix) -> Self {
        Transformed::Sparse(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, IxDyn};

    #[test]
    fn test_transformed_dense_dimensions() {
        let out = Transformed::dense(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        assert_eq!(out.n_rows(), 3);
        assert_eq!(out.n_columns(), Some(2));
        assert_eq!(out.size(), 6);
        assert!(out.is_tabular());
    }

    #[test]
    fn test_transformed_one_dimensional_is_not_tabular() {
        let out = Transformed::Dense(ArrayD::zeros(IxDyn(&[4])));
        assert_eq!(out.ndim(), 1);
        assert!(!out.is_tabular());
        assert!(matches!(
            out.to_array2(),
            Err(ComposeError::NonTabularOutput { ndim: 1, .. })
        ));
    }

    #[test]
    fn test_transformed_series_counts_as_one_column() {
        let out = Transformed::Series {
            name: "s".to_string(),
            values: Column::Primitive(Array1::from(vec![1.0, 2.0])),
        };
        assert_eq!(out.ndim(), 1);
        assert_eq!(out.n_columns(), Some(1));
        assert_eq!(out.to_array2().unwrap(), array![[1.0], [2.0]]);
    }

    #[test]
    fn test_transformed_to_frame_names_blocks() {
        let out = Transformed::dense(array![[1.0, 2.0]]);
        let frame = out.to_frame("pca").unwrap();
        assert_eq!(frame.names(), &["pca__0".to_string(), "pca__1".to_string()]);
    }

    #[test]
    fn test_transformed_scale_sparse() {
        let out = Transformed::Sparse(CsrMatrix::from_dense(&array![[0.0, 4.0]])).scale(0.25);
        assert_eq!(out.as_sparse().unwrap().get(0, 1), 1.0);
    }
}
