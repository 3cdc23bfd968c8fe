//! Conversions between the three panel representations.
//!
//! | Form      | Type                | Shape                         |
//! |-----------|---------------------|-------------------------------|
//! | nested    | [`Frame`]           | N rows × D nested columns     |
//! | 3D array  | `Array3<f64>`       | N × D × T                     |
//! | tabular   | `Array2<f64>`       | N × (D·T), variable-major     |
//!
//! Tabular columns are ordered variable-major, then time-minor: all time
//! points of the first variable, then all time points of the second, and so
//! on. All functions here are pure.

use super::frame::{Column, Frame};
use crate::error::{ComposeError, Result};
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};

/// Per-column series length, requiring it to be equal across all rows.
fn column_length(name: &str, column: &Column) -> Result<usize> {
    match column {
        Column::Primitive(_) => Ok(1),
        Column::Nested(cells) => {
            let len = cells.first().map_or(0, |c| c.len());
            if let Some((row, cell)) = cells.iter().enumerate().find(|(_, c)| c.len() != len) {
                return Err(ComposeError::UnsupportedData(format!(
                    "Unequal length series are not supported: column '{}' has length {} in row 0 \
                     but length {} in row {}",
                    name,
                    len,
                    cell.len(),
                    row
                )));
            }
            Ok(len)
        }
    }
}

/// Flatten a nested frame into a tabular array.
///
/// Each column must hold series of one length across all rows; different
/// columns may have different lengths. Primitive columns contribute a single
/// value per row.
///
/// # Errors
/// Returns [`ComposeError::UnsupportedData`] for unequal-length series within
/// a column.
pub fn nested_to_tabular(frame: &Frame) -> Result<Array2<f64>> {
    let lengths = frame
        .iter()
        .map(|(name, column)| column_length(name, column))
        .collect::<Result<Vec<_>>>()?;
    let width: usize = lengths.iter().sum();

    let mut out = Array2::zeros((frame.n_rows(), width));
    let mut offset = 0;
    for (column, len) in frame.columns().iter().zip(&lengths) {
        match column {
            Column::Primitive(values) => out.column_mut(offset).assign(values),
            Column::Nested(cells) => {
                for (i, cell) in cells.iter().enumerate() {
                    out.row_mut(i)
                        .slice_mut(ndarray::s![offset..offset + len])
                        .assign(cell);
                }
            }
        }
        offset += len;
    }
    tracing::trace!(shape = ?out.dim(), "tabularized nested frame");
    Ok(out)
}

/// Like [`nested_to_tabular`], but returns a frame of primitive columns named
/// `{column}__{t}`.
pub fn nested_to_tabular_frame(frame: &Frame) -> Result<Frame> {
    let data = nested_to_tabular(frame)?;
    let mut names = Vec::with_capacity(data.ncols());
    for (name, column) in frame.iter() {
        match column {
            Column::Primitive(_) => names.push(name.to_string()),
            Column::Nested(_) => {
                let len = column_length(name, column)?;
                names.extend((0..len).map(|t| format!("{}__{}", name, t)));
            }
        }
    }
    Frame::from_array(&data, Some(names))
}

/// Re-nest a tabular array into a single nested column.
///
/// Row `i` of `data` becomes the series in cell `(i, 0)` of a frame whose only
/// column is called `column`.
pub fn tabular_to_nested(data: ArrayView2<'_, f64>, column: &str) -> Frame {
    let cells: Vec<Array1<f64>> = data.rows().into_iter().map(|r| r.to_owned()).collect();
    let n_rows = cells.len();
    Frame::from_parts(vec![column.to_string()], vec![Column::Nested(cells)], n_rows)
}

/// Flatten a 3D array `(N, D, T)` into a tabular array `(N, D·T)`.
pub fn array3_to_tabular(data: &Array3<f64>) -> Array2<f64> {
    let (n, d, t) = data.dim();
    Array2::from_shape_fn((n, d * t), |(i, c)| data[[i, c / t, c % t]])
}

/// Convert a nested frame into a 3D array `(N, D, T)`.
///
/// # Errors
/// Returns [`ComposeError::UnsupportedData`] if any column is primitive or if
/// the series do not all share one length.
pub fn nested_to_array3(frame: &Frame) -> Result<Array3<f64>> {
    let (n, d) = frame.shape();
    let mut length: Option<usize> = None;
    for (name, column) in frame.iter() {
        let len = match column {
            Column::Primitive(_) => {
                return Err(ComposeError::UnsupportedData(format!(
                    "column '{}' holds scalars; a 3D array needs a series in every cell",
                    name
                )))
            }
            Column::Nested(_) => column_length(name, column)?,
        };
        match length {
            None => length = Some(len),
            Some(expected) if expected != len => {
                return Err(ComposeError::UnsupportedData(format!(
                    "Unequal length multivariate data are not supported: column '{}' has \
                     length {}, expected {}",
                    name, len, expected
                )))
            }
            Some(_) => {}
        }
    }

    let t = length.unwrap_or(0);
    let mut out = Array3::zeros((n, d, t));
    for (j, column) in frame.columns().iter().enumerate() {
        if let Column::Nested(cells) = column {
            for (i, cell) in cells.iter().enumerate() {
                out.index_axis_mut(Axis(0), i).row_mut(j).assign(cell);
            }
        }
    }
    Ok(out)
}

/// Convert a 3D array `(N, D, T)` into a nested frame with columns
/// `var_0 .. var_{D-1}`.
pub fn array3_to_nested(data: &Array3<f64>) -> Frame {
    let (n, d, _) = data.dim();
    let names = (0..d).map(|j| format!("var_{}", j)).collect();
    let columns = (0..d)
        .map(|j| {
            let cells: Vec<Array1<f64>> = (0..n)
                .map(|i| data.slice(ndarray::s![i, j, ..]).to_owned())
                .collect();
            Column::Nested(cells)
        })
        .collect();
    Frame::from_parts(names, columns, n)
}
