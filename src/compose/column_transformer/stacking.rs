//! Horizontal stacking of per-entry outputs.

use crate::error::{ComposeError, Result};
use crate::output::{CsrMatrix, Transformed};
use crate::panel::Frame;
use ndarray::{concatenate, Array2, ArrayView2, Axis};

/// Whether the stacked result should be sparse.
///
/// Only considered when at least one block is sparse. The density counts
/// stored values of sparse blocks and every cell of the others; the output is
/// sparse when that density is below `threshold`.
pub(crate) fn use_sparse_output<'a, I>(blocks: I, threshold: f64) -> bool
where
    I: IntoIterator<Item = &'a Transformed>,
{
    let mut any_sparse = false;
    let mut nnz = 0usize;
    let mut total = 0usize;
    for block in blocks {
        match block {
            Transformed::Sparse(matrix) => {
                any_sparse = true;
                nnz += matrix.nnz();
            }
            other => nnz += other.size(),
        }
        total += block.size();
    }
    if !any_sparse || total == 0 {
        return false;
    }
    let density = nnz as f64 / total as f64;
    tracing::debug!(density, threshold, "computed stacked output density");
    density < threshold
}

/// Fail with [`ComposeError::NonTabularOutput`] for the first block that
/// cannot be stacked column-wise.
pub(crate) fn validate_outputs(blocks: &[(String, Transformed)]) -> Result<()> {
    match blocks.iter().find(|(_, block)| !block.is_tabular()) {
        Some((name, block)) => Err(ComposeError::NonTabularOutput {
            name: name.clone(),
            ndim: block.ndim(),
        }),
        None => Ok(()),
    }
}

/// Stack named blocks side by side.
///
/// - `sparse_output`: one CSR matrix, regardless of frame preservation.
/// - else, with `preserve_dataframe` and at least one frame or series block:
///   a frame. Array blocks become primitive columns named `{entry}__{j}`.
/// - else a dense 2D array.
///
/// With no blocks the result is an `n_rows × 0` dense array.
pub(crate) fn hstack(
    blocks: &[(String, Transformed)],
    sparse_output: bool,
    preserve_dataframe: bool,
    n_rows: usize,
) -> Result<Transformed> {
    if let Some((name, block)) = blocks.iter().find(|(_, b)| b.n_rows() != n_rows) {
        return Err(ComposeError::InvalidShape {
            expected: format!("{} rows from every transformer", n_rows),
            got: format!("{} rows from '{}'", block.n_rows(), name),
        });
    }
    if blocks.is_empty() {
        return Ok(Transformed::dense(Array2::zeros((n_rows, 0))));
    }

    if sparse_output {
        tracing::debug!(n_blocks = blocks.len(), "stacking as sparse matrix");
        let matrices = blocks
            .iter()
            .map(|(_, block)| block.to_csr())
            .collect::<Result<Vec<_>>>()?;
        return Ok(Transformed::Sparse(CsrMatrix::hstack(&matrices)?));
    }

    if preserve_dataframe && blocks.iter().any(|(_, b)| b.is_frame_like()) {
        tracing::debug!(n_blocks = blocks.len(), "stacking as frame");
        let frames = blocks
            .iter()
            .map(|(name, block)| block.to_frame(name))
            .collect::<Result<Vec<Frame>>>()?;
        return Ok(Transformed::Frame(Frame::hconcat(&frames)?));
    }

    tracing::debug!(n_blocks = blocks.len(), "stacking as dense array");
    let arrays = blocks
        .iter()
        .map(|(_, block)| block.to_array2())
        .collect::<Result<Vec<_>>>()?;
    let views: Vec<ArrayView2<'_, f64>> = arrays.iter().map(|a| a.view()).collect();
    let stacked = concatenate(Axis(1), &views).map_err(|e| ComposeError::InvalidShape {
        expected: format!("{} rows from every transformer", n_rows),
        got: e.to_string(),
    })?;
    Ok(Transformed::dense(stacked))
}
