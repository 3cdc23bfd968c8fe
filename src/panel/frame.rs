//! Column-oriented frame whose cells are either scalars or whole series.

use crate::error::{ComposeError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// A single named column of a [`Frame`].
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    /// One scalar per row.
    Primitive(Array1<f64>),
    /// One series per row; series lengths may differ between rows.
    Nested(Vec<Array1<f64>>),
}

impl Column {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Primitive(values) => values.len(),
            Column::Nested(cells) => cells.len(),
        }
    }

    /// Check if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether cells hold series rather than scalars.
    pub fn is_nested(&self) -> bool {
        matches!(self, Column::Nested(_))
    }

    /// Multiply every value (every element of every series) by `weight`.
    pub fn scale(&self, weight: f64) -> Column {
        match self {
            Column::Primitive(values) => Column::Primitive(values * weight),
            Column::Nested(cells) => Column::Nested(cells.iter().map(|c| c * weight).collect()),
        }
    }

    /// Select rows by position, in the given order.
    pub fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Primitive(values) => Column::Primitive(values.select(Axis(0), rows)),
            Column::Nested(cells) => Column::Nested(rows.iter().map(|&r| cells[r].clone()).collect()),
        }
    }

    /// Number of non-zero values held by the column.
    pub fn count_nonzero(&self) -> usize {
        match self {
            Column::Primitive(values) => values.iter().filter(|v| **v != 0.0).count(),
            Column::Nested(cells) => cells
                .iter()
                .map(|c| c.iter().filter(|v| **v != 0.0).count())
                .sum(),
        }
    }
}

/// Ordered collection of named, equal-length columns.
///
/// A frame whose columns are all [`Column::Nested`] is a panel in nested form:
/// each row is an instance, each column a variable, each cell a time series.
/// Frames with primitive columns are ordinary tables (e.g. the output of a
/// series-to-primitives broadcast).
///
/// Column names are not required to be unique, since horizontal concatenation
/// of transformer outputs may repeat names. Lookup by name returns the first
/// match.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Frame {
    /// Create a frame with `n_rows` rows and no columns.
    pub fn with_rows(n_rows: usize) -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
            n_rows,
        }
    }

    /// Assemble a frame from parts the caller has already aligned.
    pub(crate) fn from_parts(names: Vec<String>, columns: Vec<Column>, n_rows: usize) -> Self {
        debug_assert_eq!(names.len(), columns.len());
        debug_assert!(columns.iter().all(|c| c.len() == n_rows));
        Self {
            names,
            columns,
            n_rows,
        }
    }

    /// Build a frame from `(name, column)` pairs.
    ///
    /// # Errors
    /// Returns [`ComposeError::InvalidShape`] if the columns differ in length,
    /// and [`ComposeError::EmptyData`] if no columns are given (use
    /// [`Frame::with_rows`] for a column-less frame).
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Column)>) -> Result<Self> {
        let mut iter = columns.into_iter();
        let (name, first) = iter.next().ok_or_else(|| {
            ComposeError::EmptyData("Cannot build a frame without columns".to_string())
        })?;
        let mut frame = Frame::with_rows(first.len());
        frame.push_column(name, first)?;
        for (name, column) in iter {
            frame.push_column(name, column)?;
        }
        Ok(frame)
    }

    /// Build a frame of nested columns from per-column cell vectors.
    pub fn from_nested<S: Into<String>>(columns: Vec<(S, Vec<Array1<f64>>)>) -> Result<Self> {
        Self::from_columns(
            columns
                .into_iter()
                .map(|(name, cells)| (name, Column::Nested(cells)))
                .collect(),
        )
    }

    /// Build a frame of primitive columns from a 2D array.
    ///
    /// Columns are named `0`, `1`, ... unless `names` is given.
    pub fn from_array(data: &Array2<f64>, names: Option<Vec<String>>) -> Result<Self> {
        let names = match names {
            Some(names) if names.len() != data.ncols() => {
                return Err(ComposeError::InvalidShape {
                    expected: format!("{} column names", data.ncols()),
                    got: format!("{} column names", names.len()),
                })
            }
            Some(names) => names,
            None => (0..data.ncols()).map(|j| j.to_string()).collect(),
        };
        let mut frame = Frame::with_rows(data.nrows());
        for (name, col) in names.into_iter().zip(data.columns()) {
            frame.push_column(name, Column::Primitive(col.to_owned()))?;
        }
        Ok(frame)
    }

    /// Append a column.
    ///
    /// # Errors
    /// Returns [`ComposeError::InvalidShape`] if the column length differs from
    /// the frame's row count.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        if column.len() != self.n_rows {
            return Err(ComposeError::InvalidShape {
                expected: format!("column of length {}", self.n_rows),
                got: format!("column of length {}", column.len()),
            });
        }
        self.names.push(name.into());
        self.columns.push(column);
        Ok(())
    }

    /// Number of rows (instances).
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns (variables).
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// `(n_rows, n_columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    /// Column names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Iterate over `(name, column)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Position of the first column called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// First column called `name`.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    /// Column at position `index`.
    pub fn column_at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Series stored at (`row`, `column`), if that column is nested.
    pub fn cell(&self, row: usize, column: usize) -> Option<ArrayView1<'_, f64>> {
        match self.columns.get(column)? {
            Column::Nested(cells) => cells.get(row).map(|c| c.view()),
            Column::Primitive(_) => None,
        }
    }

    /// Whether every column is nested (and there is at least one column).
    pub fn is_nested(&self) -> bool {
        !self.columns.is_empty() && self.columns.iter().all(Column::is_nested)
    }

    /// Whether any column is nested.
    pub fn has_nested(&self) -> bool {
        self.columns.iter().any(Column::is_nested)
    }

    /// New frame holding the columns at the given positions, in that order.
    ///
    /// # Panics
    /// If a position is out of bounds; callers resolve positions first.
    pub fn select(&self, positions: &[usize]) -> Frame {
        Frame {
            names: positions.iter().map(|&i| self.names[i].clone()).collect(),
            columns: positions.iter().map(|&i| self.columns[i].clone()).collect(),
            n_rows: self.n_rows,
        }
    }

    /// New frame holding the given rows, in that order.
    pub fn take_rows(&self, rows: &[usize]) -> Frame {
        Frame {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            n_rows: rows.len(),
        }
    }

    /// Multiply every value in the frame by `weight`.
    pub fn scale(&self, weight: f64) -> Frame {
        Frame {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.scale(weight)).collect(),
            n_rows: self.n_rows,
        }
    }

    /// Number of non-zero values across all columns.
    pub fn count_nonzero(&self) -> usize {
        self.columns.iter().map(Column::count_nonzero).sum()
    }

    /// Convert an all-primitive frame into a 2D array.
    ///
    /// # Errors
    /// Returns [`ComposeError::UnsupportedData`] if any column is nested.
    pub fn to_array(&self) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((self.n_rows, self.columns.len()));
        for (j, (name, column)) in self.iter().enumerate() {
            match column {
                Column::Primitive(values) => out.column_mut(j).assign(values),
                Column::Nested(_) => {
                    return Err(ComposeError::UnsupportedData(format!(
                        "column '{}' holds series and cannot be converted to a numeric array",
                        name
                    )))
                }
            }
        }
        Ok(out)
    }

    /// Concatenate frames side by side.
    ///
    /// # Errors
    /// Returns [`ComposeError::InvalidShape`] if the frames differ in row count
    /// and [`ComposeError::EmptyData`] for an empty slice.
    pub fn hconcat(frames: &[Frame]) -> Result<Frame> {
        let first = frames.first().ok_or_else(|| {
            ComposeError::EmptyData("Cannot concatenate an empty slice of frames".to_string())
        })?;
        let mut out = Frame::with_rows(first.n_rows);
        for frame in frames {
            if frame.n_rows != out.n_rows {
                return Err(ComposeError::InvalidShape {
                    expected: format!("({}, ?)", out.n_rows),
                    got: format!("({}, ?)", frame.n_rows),
                });
            }
            out.names.extend(frame.names.iter().cloned());
            out.columns.extend(frame.columns.iter().cloned());
        }
        Ok(out)
    }
}
