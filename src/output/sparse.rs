//! Compressed sparse row matrix used for sparse stacked outputs.

use crate::error::{ComposeError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Canonical CSR matrix.
///
/// Row `i` owns `indices[indptr[i]..indptr[i + 1]]` and the matching slice of
/// `data`. Column indices are strictly increasing within a row, so no
/// explicit duplicates are stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    shape: (usize, usize),
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// Build a matrix from raw CSR arrays, checking that they are canonical.
    ///
    /// # Errors
    /// Returns [`ComposeError::InvalidShape`] if the arrays are inconsistent
    /// with `shape`, and [`ComposeError::InvalidParameter`] if a row has
    /// unsorted or duplicate column indices.
    pub fn new(
        shape: (usize, usize),
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    ) -> Result<Self> {
        let (nrows, ncols) = shape;
        if indptr.len() != nrows + 1 {
            return Err(ComposeError::InvalidShape {
                expected: format!("indptr of length {}", nrows + 1),
                got: format!("indptr of length {}", indptr.len()),
            });
        }
        if indices.len() != data.len() || indptr.last().copied() != Some(indices.len()) {
            return Err(ComposeError::InvalidShape {
                expected: format!("{} stored values", indptr.last().copied().unwrap_or(0)),
                got: format!("{} indices and {} values", indices.len(), data.len()),
            });
        }
        if indptr[0] != 0 {
            return Err(ComposeError::InvalidShape {
                expected: "indptr starting at 0".to_string(),
                got: format!("indptr starting at {}", indptr[0]),
            });
        }
        if let Some(row) = indptr.windows(2).position(|w| w[0] > w[1]) {
            return Err(ComposeError::InvalidParameter(format!(
                "indptr must be non-decreasing (row {})",
                row
            )));
        }
        for row in 0..nrows {
            let (start, end) = (indptr[row], indptr[row + 1]);
            let cols = &indices[start..end];
            if cols.windows(2).any(|w| w[0] >= w[1]) {
                return Err(ComposeError::InvalidParameter(format!(
                    "column indices of row {} must be strictly increasing",
                    row
                )));
            }
            if let Some(&col) = cols.last() {
                if col >= ncols {
                    return Err(ComposeError::InvalidShape {
                        expected: format!("column index < {}", ncols),
                        got: format!("column index {}", col),
                    });
                }
            }
        }
        Ok(Self {
            shape,
            indptr,
            indices,
            data,
        })
    }

    /// All-zero matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            shape: (nrows, ncols),
            indptr: vec![0; nrows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Compress a dense matrix, keeping its non-zero entries.
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let mut indptr = Vec::with_capacity(dense.nrows() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for row in dense.rows() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    indices.push(j);
                    data.push(v);
                }
            }
            indptr.push(indices.len());
        }
        Self {
            shape: dense.dim(),
            indptr,
            indices,
            data,
        }
    }

    /// Build from `(row, col, value)` triplets; duplicates are summed.
    ///
    /// # Errors
    /// Returns [`ComposeError::InvalidShape`] if a triplet lies outside
    /// `shape`.
    pub fn from_triplets(shape: (usize, usize), triplets: &[(usize, usize, f64)]) -> Result<Self> {
        let (nrows, ncols) = shape;
        if let Some(&(r, c, _)) = triplets.iter().find(|(r, c, _)| *r >= nrows || *c >= ncols) {
            return Err(ComposeError::InvalidShape {
                expected: format!("entries within {:?}", shape),
                got: format!("entry at ({}, {})", r, c),
            });
        }
        let mut sorted = triplets.to_vec();
        sorted.sort_by_key(|&(r, c, _)| (r, c));

        let mut indptr = vec![0usize; nrows + 1];
        let mut indices: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut data: Vec<f64> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;
        for (r, c, v) in sorted {
            if last == Some((r, c)) {
                if let Some(d) = data.last_mut() {
                    *d += v;
                }
                continue;
            }
            indices.push(c);
            data.push(v);
            indptr[r + 1] += 1;
            last = Some((r, c));
        }
        for i in 0..nrows {
            indptr[i + 1] += indptr[i];
        }
        Ok(Self {
            shape,
            indptr,
            indices,
            data,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn nrows(&self) -> usize {
        self.shape.0
    }

    pub fn ncols(&self) -> usize {
        self.shape.1
    }

    /// Number of stored values.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Value at (`row`, `col`), zero when not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        if row >= self.nrows() {
            return 0.0;
        }
        let (start, end) = (self.indptr[row], self.indptr[row + 1]);
        match self.indices[start..end].binary_search(&col) {
            Ok(k) => self.data[start + k],
            Err(_) => 0.0,
        }
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut out = Array2::zeros(self.shape);
        for row in 0..self.nrows() {
            for k in self.indptr[row]..self.indptr[row + 1] {
                out[[row, self.indices[k]]] = self.data[k];
            }
        }
        out
    }

    /// Multiply every stored value by `weight`. A zero weight yields an
    /// all-zero matrix with nothing stored.
    pub fn scale(&self, weight: f64) -> Self {
        if weight == 0.0 {
            return Self::zeros(self.shape.0, self.shape.1);
        }
        Self {
            shape: self.shape,
            indptr: self.indptr.clone(),
            indices: self.indices.clone(),
            data: self.data.iter().map(|v| v * weight).collect(),
        }
    }

    /// Stack matrices side by side.
    ///
    /// # Errors
    /// Returns [`ComposeError::InvalidShape`] if the row counts differ and
    /// [`ComposeError::EmptyData`] for an empty slice.
    pub fn hstack(blocks: &[CsrMatrix]) -> Result<Self> {
        let first = blocks.first().ok_or_else(|| {
            ComposeError::EmptyData("Cannot stack an empty slice of matrices".to_string())
        })?;
        let nrows = first.nrows();
        if let Some(block) = blocks.iter().find(|b| b.nrows() != nrows) {
            return Err(ComposeError::InvalidShape {
                expected: format!("({}, ?)", nrows),
                got: format!("{:?}", block.shape()),
            });
        }

        let nnz = blocks.iter().map(CsrMatrix::nnz).sum();
        let mut indptr = Vec::with_capacity(nrows + 1);
        let mut indices = Vec::with_capacity(nnz);
        let mut data = Vec::with_capacity(nnz);
        indptr.push(0);
        for row in 0..nrows {
            let mut offset = 0;
            for block in blocks {
                let (start, end) = (block.indptr[row], block.indptr[row + 1]);
                indices.extend(block.indices[start..end].iter().map(|c| c + offset));
                data.extend_from_slice(&block.data[start..end]);
                offset += block.ncols();
            }
            indptr.push(indices.len());
        }
        let ncols = blocks.iter().map(CsrMatrix::ncols).sum();
        Ok(Self {
            shape: (nrows, ncols),
            indptr,
            indices,
            data,
        })
    }
}
