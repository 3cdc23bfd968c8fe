//! ColumnTransformer implementation.
//!
//! Routes column subsets of a panel to different transformers and stacks the
//! results.

use super::stacking::{hstack, use_sparse_output, validate_outputs};
use crate::compose::FunctionTransformer;
use crate::error::{ComposeError, Result};
use crate::output::Transformed;
use crate::panel::{check_frame, CheckConfig, Frame, Panel};
use crate::traits::{Estimator, PanelTransformer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

/// Name of the implicit entry holding the unclaimed columns.
pub const REMAINDER: &str = "remainder";

type Selector = dyn Fn(&Frame) -> ColumnSpec + Send + Sync;

/// Specifies which columns a transformer should be applied to.
#[derive(Clone)]
pub enum ColumnSpec {
    /// A single column by name.
    Name(String),
    /// Columns by name.
    Names(Vec<String>),
    /// A single column by position.
    Index(usize),
    /// Columns by position.
    Indices(Vec<usize>),
    /// A range of positions.
    Range(Range<usize>),
    /// One flag per input column.
    Mask(Vec<bool>),
    /// Every column.
    All,
    /// Evaluated against the input frame; must return a non-callable spec.
    Callable(Arc<Selector>),
}

impl ColumnSpec {
    pub fn callable<F>(selector: F) -> Self
    where
        F: Fn(&Frame) -> ColumnSpec + Send + Sync + 'static,
    {
        ColumnSpec::Callable(Arc::new(selector))
    }

    /// Resolve the spec to column positions of `frame`.
    ///
    /// # Errors
    /// Returns [`ComposeError::InvalidParameter`] for unknown names,
    /// out-of-range positions, masks of the wrong length, and callables that
    /// return another callable.
    pub fn resolve(&self, frame: &Frame) -> Result<Vec<usize>> {
        let n_columns = frame.n_columns();
        let check_index = |index: usize| {
            if index < n_columns {
                Ok(index)
            } else {
                Err(ComposeError::InvalidParameter(format!(
                    "Column index {} out of bounds for {} columns",
                    index, n_columns
                )))
            }
        };
        let find_name = |name: &str| {
            frame.position(name).ok_or_else(|| {
                ComposeError::InvalidParameter(format!("Column '{}' not found in input", name))
            })
        };

        match self {
            ColumnSpec::Name(name) => Ok(vec![find_name(name)?]),
            ColumnSpec::Names(names) => names.iter().map(|n| find_name(n)).collect(),
            ColumnSpec::Index(index) => Ok(vec![check_index(*index)?]),
            ColumnSpec::Indices(indices) => indices.iter().map(|&i| check_index(i)).collect(),
            ColumnSpec::Range(range) => {
                if range.end > n_columns {
                    return Err(ComposeError::InvalidParameter(format!(
                        "Column range {:?} out of bounds for {} columns",
                        range, n_columns
                    )));
                }
                Ok(range.clone().collect())
            }
            ColumnSpec::Mask(mask) => {
                if mask.len() != n_columns {
                    return Err(ComposeError::InvalidParameter(format!(
                        "Boolean mask has length {}, but the input has {} columns",
                        mask.len(),
                        n_columns
                    )));
                }
                Ok(mask
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &keep)| keep.then_some(i))
                    .collect())
            }
            ColumnSpec::All => Ok((0..n_columns).collect()),
            ColumnSpec::Callable(selector) => match selector(frame) {
                ColumnSpec::Callable(_) => Err(ComposeError::InvalidParameter(
                    "A column selector must not return another selector".to_string(),
                )),
                spec => spec.resolve(frame),
            },
        }
    }
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSpec::Name(name) => f.debug_tuple("Name").field(name).finish(),
            ColumnSpec::Names(names) => f.debug_tuple("Names").field(names).finish(),
            ColumnSpec::Index(index) => f.debug_tuple("Index").field(index).finish(),
            ColumnSpec::Indices(indices) => f.debug_tuple("Indices").field(indices).finish(),
            ColumnSpec::Range(range) => f.debug_tuple("Range").field(range).finish(),
            ColumnSpec::Mask(mask) => f.debug_tuple("Mask").field(mask).finish(),
            ColumnSpec::All => f.write_str("All"),
            ColumnSpec::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl From<&str> for ColumnSpec {
    fn from(name: &str) -> Self {
        ColumnSpec::Name(name.to_string())
    }
}

impl From<Vec<&str>> for ColumnSpec {
    fn from(names: Vec<&str>) -> Self {
        ColumnSpec::Names(names.into_iter().map(String::from).collect())
    }
}

impl From<usize> for ColumnSpec {
    fn from(index: usize) -> Self {
        ColumnSpec::Index(index)
    }
}

impl From<Vec<usize>> for ColumnSpec {
    fn from(indices: Vec<usize>) -> Self {
        ColumnSpec::Indices(indices)
    }
}

impl From<Range<usize>> for ColumnSpec {
    fn from(range: Range<usize>) -> Self {
        ColumnSpec::Range(range)
    }
}

impl From<Vec<bool>> for ColumnSpec {
    fn from(mask: Vec<bool>) -> Self {
        ColumnSpec::Mask(mask)
    }
}

/// What an entry does with its columns.
#[derive(Clone, Debug)]
pub enum TransformerStep {
    Transformer(Box<dyn PanelTransformer>),
    /// Forward the selected columns unchanged.
    Passthrough,
    /// Leave the selected columns out of the output.
    Drop,
}

impl TransformerStep {
    pub fn transformer<T: PanelTransformer + 'static>(transformer: T) -> Self {
        TransformerStep::Transformer(Box::new(transformer))
    }

    /// Parse `"passthrough"` or `"drop"`.
    ///
    /// # Errors
    /// Returns [`ComposeError::InvalidParameter`] for any other string.
    pub fn sentinel(value: &str) -> Result<Self> {
        match value {
            "passthrough" => Ok(TransformerStep::Passthrough),
            "drop" => Ok(TransformerStep::Drop),
            other => Err(ComposeError::InvalidParameter(format!(
                "Transformers must be a transformer, 'passthrough' or 'drop'; got '{}'",
                other
            ))),
        }
    }

    pub fn as_transformer(&self) -> Option<&dyn PanelTransformer> {
        match self {
            TransformerStep::Transformer(t) => Some(t.as_ref()),
            _ => None,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, TransformerStep::Drop)
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, TransformerStep::Passthrough)
    }
}

impl FromStr for TransformerStep {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self> {
        TransformerStep::sentinel(s)
    }
}

/// Configuration for [`ColumnTransformer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformerConfig {
    /// Stack as sparse when the overall density is below this value.
    pub sparse_threshold: f64,
    /// Worker count: `1` sequential, `-1` all cores, `n > 1` that many.
    pub n_jobs: i32,
    /// Per-entry output multipliers, keyed by entry name.
    pub transformer_weights: BTreeMap<String, f64>,
    /// Return a frame when any entry returns a frame or series.
    pub preserve_dataframe: bool,
}

impl Default for ColumnTransformerConfig {
    fn default() -> Self {
        Self {
            sparse_threshold: 0.3,
            n_jobs: 1,
            transformer_weights: BTreeMap::new(),
            preserve_dataframe: true,
        }
    }
}

#[derive(Clone, Debug)]
struct TransformerEntry {
    name: String,
    step: TransformerStep,
    columns: ColumnSpec,
}

/// One entry of the fitted transformer list.
#[derive(Clone, Debug)]
pub struct FittedEntry {
    name: String,
    step: TransformerStep,
    columns: Vec<usize>,
}

impl FittedEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fitted transformer or sentinel. Entries that selected no columns keep
    /// their unfitted transformer.
    pub fn step(&self) -> &TransformerStep {
        &self.step
    }

    /// Resolved column positions.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Whether the entry takes part in `transform`.
    fn is_active(&self) -> bool {
        !self.step.is_drop() && !self.columns.is_empty()
    }
}

#[derive(Clone, Debug)]
struct FittedState {
    entries: Vec<FittedEntry>,
    remainder_columns: Vec<usize>,
    sparse_output: bool,
    feature_names_in: Vec<String>,
}

/// Applies different transformers to different columns of a panel.
///
/// Each entry is a `(name, step, columns)` triple. Columns claimed by no
/// entry form the remainder, which is dropped by default and can instead be
/// passed through or given its own transformer. Outputs are multiplied by
/// their weight and stacked side by side as a sparse matrix, a frame or a
/// dense array.
///
/// # Example
/// ```ignore
/// use panel_compose::{ColumnConcatenator, ColumnTransformer, PanelTransformer, TransformerStep};
///
/// let mut ct = ColumnTransformer::new()
///     .add("concat", ColumnConcatenator::new(), vec!["price", "volume"])
///     .add_passthrough("raw", "spread")
///     .with_remainder(TransformerStep::Drop);
///
/// let out = ct.fit_transform(&panel)?;
/// ```
#[derive(Clone, Debug)]
pub struct ColumnTransformer {
    transformers: Vec<TransformerEntry>,
    remainder: TransformerStep,
    config: ColumnTransformerConfig,
    fitted: Option<FittedState>,
}

impl Default for ColumnTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnTransformer {
    /// Create a new ColumnTransformer with no entries.
    pub fn new() -> Self {
        Self {
            transformers: Vec::new(),
            remainder: TransformerStep::Drop,
            config: ColumnTransformerConfig::default(),
            fitted: None,
        }
    }

    /// Add a transformer for the given columns.
    pub fn add<T: PanelTransformer + 'static>(
        self,
        name: impl Into<String>,
        transformer: T,
        columns: impl Into<ColumnSpec>,
    ) -> Self {
        self.add_step(name, TransformerStep::transformer(transformer), columns)
    }

    /// Pass the given columns through unchanged.
    pub fn add_passthrough(self, name: impl Into<String>, columns: impl Into<ColumnSpec>) -> Self {
        self.add_step(name, TransformerStep::Passthrough, columns)
    }

    /// Drop the given columns.
    pub fn add_drop(self, name: impl Into<String>, columns: impl Into<ColumnSpec>) -> Self {
        self.add_step(name, TransformerStep::Drop, columns)
    }

    /// Add an entry with any step.
    pub fn add_step(
        mut self,
        name: impl Into<String>,
        step: TransformerStep,
        columns: impl Into<ColumnSpec>,
    ) -> Self {
        self.transformers.push(TransformerEntry {
            name: name.into(),
            step,
            columns: columns.into(),
        });
        self
    }

    /// What to do with unclaimed columns (default: drop).
    pub fn with_remainder(mut self, remainder: TransformerStep) -> Self {
        self.remainder = remainder;
        self
    }

    /// Density below which a stacked output containing sparse blocks stays sparse.
    pub fn with_sparse_threshold(mut self, threshold: f64) -> Self {
        self.config.sparse_threshold = threshold;
        self
    }

    /// Number of workers: `1` runs sequentially, `-1` uses every core.
    pub fn with_n_jobs(mut self, n_jobs: i32) -> Self {
        self.config.n_jobs = n_jobs;
        self
    }

    /// Multiply the output of entry `name` by `weight`.
    pub fn with_transformer_weight(mut self, name: impl Into<String>, weight: f64) -> Self {
        self.config.transformer_weights.insert(name.into(), weight);
        self
    }

    /// Keep frame outputs as a frame when no block is sparse.
    pub fn with_preserve_dataframe(mut self, preserve: bool) -> Self {
        self.config.preserve_dataframe = preserve;
        self
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: ColumnTransformerConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &ColumnTransformerConfig {
        &self.config
    }

    /// Number of user-defined entries (the remainder is not counted).
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Replace the step of the entry called `name` (or the remainder).
    ///
    /// # Errors
    /// Returns [`ComposeError::InvalidParameter`] if no entry has that name.
    pub fn set_transformer(&mut self, name: &str, step: TransformerStep) -> Result<()> {
        if name == REMAINDER {
            self.remainder = step;
            return Ok(());
        }
        let entry = self
            .transformers
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| {
                ComposeError::InvalidParameter(format!("No transformer named '{}'", name))
            })?;
        entry.step = step;
        Ok(())
    }

    fn fitted_state(&self) -> Result<&FittedState> {
        self.fitted.as_ref().ok_or_else(|| ComposeError::NotFitted {
            estimator: self.name().to_string(),
        })
    }

    /// Fitted entries in order, the remainder last when present.
    pub fn fitted_transformers(&self) -> Result<&[FittedEntry]> {
        Ok(&self.fitted_state()?.entries)
    }

    /// Fitted steps by entry name.
    pub fn named_transformers(&self) -> Result<BTreeMap<&str, &TransformerStep>> {
        Ok(self
            .fitted_state()?
            .entries
            .iter()
            .map(|e| (e.name.as_str(), &e.step))
            .collect())
    }

    /// Whether `transform` returns a sparse matrix.
    pub fn sparse_output(&self) -> Result<bool> {
        Ok(self.fitted_state()?.sparse_output)
    }

    /// Positions of the columns no entry claimed during fit.
    pub fn remainder_columns(&self) -> Result<&[usize]> {
        Ok(&self.fitted_state()?.remainder_columns)
    }

    /// Column names seen during fit.
    pub fn feature_names_in(&self) -> Result<&[String]> {
        Ok(&self.fitted_state()?.feature_names_in)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.transformers {
            if entry.name == REMAINDER {
                return Err(ComposeError::InvalidParameter(format!(
                    "Estimator name '{}' is reserved for the remainder",
                    REMAINDER
                )));
            }
            if entry.name.contains("__") {
                return Err(ComposeError::InvalidParameter(format!(
                    "Estimator names must not contain '__': got '{}'",
                    entry.name
                )));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ComposeError::InvalidParameter(format!(
                    "Names provided are not unique: '{}'",
                    entry.name
                )));
            }
        }
        validate_config(&self.config, |name| name == REMAINDER || seen.contains(name))
    }

    /// Resolve every entry against `frame` and append the remainder entry if
    /// any column is unclaimed.
    fn resolve_entries(&self, frame: &Frame) -> Result<(Vec<FittedEntry>, Vec<usize>)> {
        let mut claimed = vec![false; frame.n_columns()];
        let mut entries = Vec::with_capacity(self.transformers.len() + 1);
        for entry in &self.transformers {
            let columns = entry.columns.resolve(frame)?;
            for &c in &columns {
                claimed[c] = true;
            }
            entries.push(FittedEntry {
                name: entry.name.clone(),
                step: entry.step.clone(),
                columns,
            });
        }

        let remainder: Vec<usize> = claimed
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| (!c).then_some(i))
            .collect();
        if !remainder.is_empty() {
            entries.push(FittedEntry {
                name: REMAINDER.to_string(),
                step: self.remainder.clone(),
                columns: remainder.clone(),
            });
        }
        Ok((entries, remainder))
    }

    fn weight(&self, name: &str) -> Option<f64> {
        self.config.transformer_weights.get(name).copied()
    }

    fn finish(&self, name: &str, output: Transformed) -> (String, Transformed) {
        let output = match self.weight(name) {
            Some(weight) => output.scale(weight),
            None => output,
        };
        (name.to_string(), output)
    }
}

fn validate_config(
    config: &ColumnTransformerConfig,
    known_name: impl Fn(&str) -> bool,
) -> Result<()> {
    if !(0.0..=1.0).contains(&config.sparse_threshold) {
        return Err(ComposeError::InvalidParameter(format!(
            "sparse_threshold must be in [0, 1], got {}",
            config.sparse_threshold
        )));
    }
    if config.n_jobs == 0 || config.n_jobs < -1 {
        return Err(ComposeError::InvalidParameter(format!(
            "n_jobs must be -1 or a positive integer, got {}",
            config.n_jobs
        )));
    }
    if let Some(name) = config
        .transformer_weights
        .keys()
        .find(|name| !known_name(name))
    {
        return Err(ComposeError::InvalidParameter(format!(
            "transformer_weights refers to unknown transformer '{}'",
            name
        )));
    }
    Ok(())
}

/// Fit one entry on its columns, returning the fitted entry and its output.
fn fit_transform_entry(entry: &FittedEntry, frame: &Frame) -> Result<(FittedEntry, Option<Transformed>)> {
    if !entry.is_active() {
        return Ok((entry.clone(), None));
    }
    let subset = frame.select(&entry.columns);
    tracing::debug!(
        entry = entry.name.as_str(),
        n_columns = entry.columns.len(),
        "fitting column transformer entry"
    );
    let (step, output) = match &entry.step {
        TransformerStep::Transformer(template) => {
            let mut transformer = template.clone();
            let output = transformer.fit_transform(&Panel::Frame(subset))?;
            (TransformerStep::Transformer(transformer), output)
        }
        TransformerStep::Passthrough => {
            let mut identity = FunctionTransformer::identity();
            let output = identity.fit_transform(&Panel::Frame(subset))?;
            (TransformerStep::Passthrough, output)
        }
        TransformerStep::Drop => return Ok((entry.clone(), None)),
    };
    let fitted = FittedEntry {
        name: entry.name.clone(),
        step,
        columns: entry.columns.clone(),
    };
    Ok((fitted, Some(output)))
}

/// Transform `frame` with one fitted entry.
fn transform_entry(entry: &FittedEntry, frame: &Frame) -> Result<Option<Transformed>> {
    if !entry.is_active() {
        return Ok(None);
    }
    let subset = frame.select(&entry.columns);
    match &entry.step {
        TransformerStep::Transformer(transformer) => {
            transformer.transform(&Panel::Frame(subset)).map(Some)
        }
        TransformerStep::Passthrough => Ok(Some(Transformed::Frame(subset))),
        TransformerStep::Drop => Ok(None),
    }
}

/// Run `f` for every index in `0..len`, keeping index order in the result.
#[cfg(feature = "parallel")]
fn map_entries<T, F>(n_jobs: i32, len: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Send + Sync,
{
    use rayon::prelude::*;

    if n_jobs == 1 || len <= 1 {
        return (0..len).map(f).collect();
    }
    let num_threads = if n_jobs < 0 { 0 } else { n_jobs as usize };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| ComposeError::InvalidParameter(format!("Cannot start worker pool: {}", e)))?;
    tracing::debug!(n_jobs, n_entries = len, "running entries on worker pool");
    pool.install(|| (0..len).into_par_iter().map(&f).collect())
}

#[cfg(not(feature = "parallel"))]
fn map_entries<T, F>(n_jobs: i32, len: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Send + Sync,
{
    if n_jobs != 1 {
        tracing::warn!(n_jobs, "built without the `parallel` feature; running sequentially");
    }
    (0..len).map(f).collect()
}

impl PanelTransformer for ColumnTransformer {
    fn fit(&mut self, x: &Panel) -> Result<()> {
        self.fit_transform(x).map(|_| ())
    }

    fn transform(&self, x: &Panel) -> Result<Transformed> {
        let state = self.fitted_state()?;
        let frame = check_frame(x, &CheckConfig::default())?;

        let expected = state.feature_names_in.len();
        if frame.n_columns() != expected {
            return Err(ComposeError::FeatureMismatch {
                expected_features: expected,
                got_features: frame.n_columns(),
            });
        }
        if frame.names() != state.feature_names_in.as_slice() {
            return Err(ComposeError::InvalidParameter(
                "Column names of X differ from those seen during fit".to_string(),
            ));
        }

        let outputs = map_entries(self.config.n_jobs, state.entries.len(), |i| {
            transform_entry(&state.entries[i], &frame)
        })?;
        let blocks: Vec<(String, Transformed)> = state
            .entries
            .iter()
            .zip(outputs)
            .filter_map(|(entry, output)| output.map(|o| self.finish(&entry.name, o)))
            .collect();

        validate_outputs(&blocks)?;
        hstack(
            &blocks,
            state.sparse_output,
            self.config.preserve_dataframe,
            frame.n_rows(),
        )
    }

    /// Fit every entry and stack the outputs in a single pass.
    fn fit_transform(&mut self, x: &Panel) -> Result<Transformed> {
        self.fitted = None;
        self.validate()?;
        let frame = check_frame(x, &CheckConfig::default())?;
        let (entries, remainder_columns) = self.resolve_entries(&frame)?;

        let results = map_entries(self.config.n_jobs, entries.len(), |i| {
            fit_transform_entry(&entries[i], &frame)
        })?;
        let mut fitted_entries = Vec::with_capacity(results.len());
        let mut blocks = Vec::with_capacity(results.len());
        for (entry, output) in results {
            if let Some(output) = output {
                blocks.push(self.finish(&entry.name, output));
            }
            fitted_entries.push(entry);
        }

        let sparse_output =
            use_sparse_output(blocks.iter().map(|(_, b)| b), self.config.sparse_threshold);
        validate_outputs(&blocks)?;
        let stacked = hstack(
            &blocks,
            sparse_output,
            self.config.preserve_dataframe,
            frame.n_rows(),
        )?;

        tracing::debug!(
            n_entries = fitted_entries.len(),
            n_remainder = remainder_columns.len(),
            sparse_output,
            "fitted column transformer"
        );
        self.fitted = Some(FittedState {
            entries: fitted_entries,
            remainder_columns,
            sparse_output,
            feature_names_in: frame.names().to_vec(),
        });
        Ok(stacked)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn name(&self) -> &'static str {
        "ColumnTransformer"
    }
}

impl Estimator for ColumnTransformer {
    type Params = ColumnTransformerConfig;

    fn get_params(&self) -> Self::Params {
        self.config.clone()
    }

    fn set_params(&mut self, params: Self::Params) -> Result<()> {
        validate_config(&params, |name| {
            name == REMAINDER || self.transformers.iter().any(|e| e.name == name)
        })?;
        self.config = params;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{ColumnConcatenator, SeriesFunctionTransformer, SeriesToPrimitivesRowTransformer};
    use crate::output::CsrMatrix;
    use crate::panel::{nested_to_tabular, Column};
    use crate::traits::SeriesOutput;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2, Array3, ArrayD, Axis, IxDyn};
    use proptest::prelude::*;

    /// Subtracts the per-column mean learned during fit from each instance's
    /// mean, returning one dense column per input column.
    #[derive(Clone, Debug, Default)]
    struct MeanShift {
        means: Option<Vec<f64>>,
    }

    fn instance_means(frame: &Frame) -> Array2<f64> {
        let mut out = Array2::zeros((frame.n_rows(), frame.n_columns()));
        for j in 0..frame.n_columns() {
            for i in 0..frame.n_rows() {
                out[[i, j]] = frame.cell(i, j).and_then(|c| c.mean()).unwrap_or(0.0);
            }
        }
        out
    }

    impl PanelTransformer for MeanShift {
        fn fit(&mut self, x: &Panel) -> Result<()> {
            let frame = check_frame(x, &CheckConfig::default())?;
            let means = instance_means(&frame);
            self.means = Some(
                means
                    .mean_axis(Axis(0))
                    .map(|m| m.to_vec())
                    .unwrap_or_default(),
            );
            Ok(())
        }

        fn transform(&self, x: &Panel) -> Result<Transformed> {
            self.check_is_fitted()?;
            let frame = check_frame(x, &CheckConfig::default())?;
            let mut out = instance_means(&frame);
            if let Some(means) = &self.means {
                for (mut col, m) in out.columns_mut().into_iter().zip(means) {
                    col -= *m;
                }
            }
            Ok(Transformed::dense(out))
        }

        fn is_fitted(&self) -> bool {
            self.means.is_some()
        }
    }

    fn tabularize() -> FunctionTransformer {
        FunctionTransformer::new(|frame: &Frame| Ok(Transformed::dense(nested_to_tabular(frame)?)))
    }

    fn sparsify() -> FunctionTransformer {
        FunctionTransformer::new(|frame: &Frame| {
            Ok(Transformed::Sparse(CsrMatrix::from_dense(&nested_to_tabular(frame)?)))
        })
    }

    /// 4 instances, variables a, b, c, each of length 3.
    fn panel() -> Panel {
        let cube = Array3::from_shape_fn((4, 3, 3), |(i, j, k)| (i * 100 + j * 10 + k) as f64);
        let frame = crate::panel::array3_to_nested(&cube);
        let names: Vec<&str> = vec!["a", "b", "c"];
        let columns = names
            .into_iter()
            .zip(frame.columns().iter().cloned())
            .collect();
        Panel::from(Frame::from_columns(columns).unwrap())
    }

    #[test]
    fn test_column_transformer_requires_fit() {
        let ct = ColumnTransformer::new().add("t", tabularize(), ColumnSpec::All);
        assert!(matches!(
            ct.transform(&panel()),
            Err(ComposeError::NotFitted { .. })
        ));
        assert!(ct.fitted_transformers().is_err());
    }

    #[test]
    fn test_column_transformer_duplicate_names() {
        let mut ct = ColumnTransformer::new()
            .add("t", tabularize(), "a")
            .add("t", tabularize(), "b");
        assert!(matches!(
            ct.fit(&panel()),
            Err(ComposeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_column_transformer_failed_refit_clears_state() {
        let mut ct = ColumnTransformer::new().add("t", tabularize(), "a");
        ct.fit(&panel()).unwrap();
        assert!(ct.is_fitted());

        let mut ct = ct.add("t", tabularize(), "b");
        assert!(ct.fit(&panel()).is_err());
        assert!(!ct.is_fitted());
        assert!(matches!(
            ct.transform(&panel()),
            Err(ComposeError::NotFitted { .. })
        ));
    }

    #[test]
    fn test_column_transformer_reserved_names() {
        let mut ct = ColumnTransformer::new().add("remainder", tabularize(), "a");
        assert!(matches!(
            ct.fit(&panel()),
            Err(ComposeError::InvalidParameter(_))
        ));
        let mut ct = ColumnTransformer::new().add("a__b", tabularize(), "a");
        assert!(matches!(
            ct.fit(&panel()),
            Err(ComposeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_transformer_step_sentinels() {
        assert!(TransformerStep::sentinel("drop").unwrap().is_drop());
        assert!("passthrough".parse::<TransformerStep>().unwrap().is_passthrough());
        assert!(matches!(
            TransformerStep::sentinel("keep"),
            Err(ComposeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_column_transformer_output_width() {
        // Widths: 2 columns × 3 = 6, plus 1 column × 3 = 3.
        let mut ct = ColumnTransformer::new()
            .add("ab", tabularize(), vec!["a", "b"])
            .add("c", tabularize(), "c");
        let out = ct.fit_transform(&panel()).unwrap();
        let data = out.to_array2().unwrap();
        assert_eq!(data.dim(), (4, 9));
        assert_eq!(data[[1, 3]], 110.0);
        assert_eq!(data[[1, 6]], 120.0);
        assert!(!ct.sparse_output().unwrap());
    }

    #[test]
    fn test_column_transformer_weights() {
        let mut ct = ColumnTransformer::new()
            .add("a", tabularize(), "a")
            .add("b", tabularize(), "b")
            .with_transformer_weight("b", 0.5);
        let data = ct.fit_transform(&panel()).unwrap().to_array2().unwrap();
        assert_eq!(data.dim(), (4, 6));
        assert_abs_diff_eq!(data[[2, 0]], 200.0);
        assert_abs_diff_eq!(data[[2, 4]], 105.5);
    }

    #[test]
    fn test_column_transformer_unknown_weight() {
        let mut ct = ColumnTransformer::new()
            .add("a", tabularize(), "a")
            .with_transformer_weight("z", 2.0);
        assert!(matches!(
            ct.fit(&panel()),
            Err(ComposeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_column_transformer_remainder_drop() {
        let mut ct = ColumnTransformer::new().add("a", tabularize(), "a");
        let data = ct.fit_transform(&panel()).unwrap().to_array2().unwrap();
        assert_eq!(data.dim(), (4, 3));
        assert_eq!(ct.remainder_columns().unwrap(), &[1, 2]);
        let entries = ct.fitted_transformers().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name(), REMAINDER);
        assert!(entries[1].step().is_drop());
    }

    #[test]
    fn test_column_transformer_remainder_passthrough_preserves_frame() {
        let mut ct = ColumnTransformer::new()
            .add("a", tabularize(), "a")
            .with_remainder(TransformerStep::Passthrough);
        let out = ct.fit_transform(&panel()).unwrap();
        let frame = out.into_frame().unwrap();
        assert_eq!(
            frame.names(),
            &["a__0", "a__1", "a__2", "b", "c"].map(String::from)
        );
        assert!(frame.column("b").unwrap().is_nested());
    }

    #[test]
    fn test_column_transformer_remainder_estimator() {
        let mut ct = ColumnTransformer::new()
            .add_drop("a", "a")
            .with_remainder(TransformerStep::transformer(MeanShift::default()));
        let data = ct.fit_transform(&panel()).unwrap().to_array2().unwrap();
        assert_eq!(data.dim(), (4, 2));
        // Instance means of b are 11, 111, 211, 311: centred on 161.
        assert_abs_diff_eq!(data[[0, 0]], -150.0, epsilon = 1e-9);
        let named = ct.named_transformers().unwrap();
        let remainder = named[REMAINDER].as_transformer().unwrap();
        assert!(remainder.is_fitted());
    }

    #[test]
    fn test_column_transformer_stores_fitted_clones() {
        let template = MeanShift::default();
        let mut ct = ColumnTransformer::new().add("shift", template, vec![0usize, 1]);
        ct.fit(&panel()).unwrap();
        let entry = &ct.fitted_transformers().unwrap()[0];
        assert!(entry.step().as_transformer().unwrap().is_fitted());

        // Transforming other data uses the means learned during fit.
        let data = ct.transform(&panel()).unwrap().to_array2().unwrap();
        assert_abs_diff_eq!(data.column(0).sum(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_column_transformer_empty_selection_keeps_unfitted() {
        let mut ct = ColumnTransformer::new()
            .add("none", MeanShift::default(), Vec::<usize>::new())
            .add("a", tabularize(), "a");
        let data = ct.fit_transform(&panel()).unwrap().to_array2().unwrap();
        assert_eq!(data.dim(), (4, 3));
        let entry = &ct.fitted_transformers().unwrap()[0];
        assert!(!entry.step().as_transformer().unwrap().is_fitted());
        assert_eq!(ct.transform(&panel()).unwrap().to_array2().unwrap(), data);
    }

    #[test]
    fn test_column_transformer_all_false_mask() {
        let mut ct = ColumnTransformer::new().add("m", tabularize(), vec![false, false, false]);
        let data = ct.fit_transform(&panel()).unwrap().to_array2().unwrap();
        assert_eq!(data.dim(), (4, 0));
    }

    #[test]
    fn test_column_transformer_selector_errors() {
        let mut ct = ColumnTransformer::new().add("z", tabularize(), "z");
        assert!(matches!(ct.fit(&panel()), Err(ComposeError::InvalidParameter(_))));
        let mut ct = ColumnTransformer::new().add("i", tabularize(), 7usize);
        assert!(matches!(ct.fit(&panel()), Err(ComposeError::InvalidParameter(_))));
        let mut ct = ColumnTransformer::new().add("m", tabularize(), vec![true]);
        assert!(matches!(ct.fit(&panel()), Err(ComposeError::InvalidParameter(_))));
        let mut ct = ColumnTransformer::new().add("r", tabularize(), 1usize..5);
        assert!(matches!(ct.fit(&panel()), Err(ComposeError::InvalidParameter(_))));
    }

    #[test]
    fn test_column_spec_callable() {
        let spec = ColumnSpec::callable(|frame: &Frame| {
            ColumnSpec::Indices((0..frame.n_columns()).filter(|j| j % 2 == 0).collect())
        });
        let Panel::Frame(frame) = panel() else {
            unreachable!()
        };
        assert_eq!(spec.resolve(&frame).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_column_transformer_non_tabular_output() {
        let flat = FunctionTransformer::new(|frame: &Frame| {
            Ok(Transformed::Dense(ArrayD::zeros(IxDyn(&[frame.n_rows()]))))
        });
        let mut ct = ColumnTransformer::new().add("flat", flat, "a");
        match ct.fit_transform(&panel()) {
            Err(ComposeError::NonTabularOutput { name, ndim }) => {
                assert_eq!(name, "flat");
                assert_eq!(ndim, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_column_transformer_series_output_counts_as_column() {
        let series = FunctionTransformer::new(|frame: &Frame| {
            Ok(Transformed::Series {
                name: "len".to_string(),
                values: Column::Primitive(Array1::from_elem(frame.n_rows(), 3.0)),
            })
        });
        let mut ct = ColumnTransformer::new()
            .add("len", series, "a")
            .add("b", tabularize(), "b");
        let frame = ct.fit_transform(&panel()).unwrap().into_frame().unwrap();
        assert_eq!(frame.shape(), (4, 4));
        assert_eq!(frame.names()[0], "len");
        assert_eq!(frame.names()[1], "b__0");
    }

    #[test]
    fn test_column_transformer_sparse_output() {
        let x = Panel::from(Array3::from_shape_fn((4, 2, 5), |(i, j, k)| {
            if i == j && k == 0 {
                1.0
            } else {
                0.0
            }
        }));
        let mut ct = ColumnTransformer::new().add("s", sparsify(), ColumnSpec::All);
        let out = ct.fit_transform(&x).unwrap();
        assert!(ct.sparse_output().unwrap());
        let matrix = out.as_sparse().unwrap();
        assert_eq!(matrix.shape(), (4, 10));
        assert_eq!(matrix.nnz(), 2);

        // Zero threshold always stacks dense.
        let mut ct = ColumnTransformer::new()
            .add("s", sparsify(), ColumnSpec::All)
            .with_sparse_threshold(0.0);
        assert!(!ct.fit_transform(&x).unwrap().is_sparse());
    }

    #[test]
    fn test_column_transformer_sparse_takes_precedence_over_frame() {
        let x = Panel::from(Array3::from_shape_fn((4, 2, 5), |(i, j, k)| {
            if i == 0 && j == 0 && k == 0 {
                1.0
            } else {
                0.0
            }
        }));
        let mut ct = ColumnTransformer::new()
            .add("s", sparsify(), "var_0")
            .add(
                "rows",
                SeriesToPrimitivesRowTransformer::new(SeriesFunctionTransformer::to_primitives(
                    |x| Ok(SeriesOutput::Primitives(Array1::zeros(x.ncols()))),
                ))
                .unwrap(),
                "var_1",
            )
            .with_sparse_threshold(0.5);
        let out = ct.fit_transform(&x).unwrap();
        assert!(out.is_sparse());
        assert_eq!(out.as_sparse().unwrap().shape(), (4, 6));
        assert!(ct.transform(&x).unwrap().is_sparse());
    }

    #[test]
    fn test_column_transformer_frame_output_not_preserved() {
        let mut ct = ColumnTransformer::new()
            .add(
                "rows",
                SeriesToPrimitivesRowTransformer::new(SeriesFunctionTransformer::to_primitives(
                    |x| Ok(SeriesOutput::Primitives(Array1::ones(x.ncols()))),
                ))
                .unwrap(),
                ColumnSpec::All,
            )
            .with_preserve_dataframe(false);
        let out = ct.fit_transform(&panel()).unwrap();
        assert!(matches!(out, Transformed::Dense(_)));
        assert_eq!(out.to_array2().unwrap(), Array2::<f64>::ones((4, 3)));
    }

    #[test]
    fn test_column_transformer_nested_entries() {
        let inner = ColumnTransformer::new().add("concat", ColumnConcatenator::new(), ColumnSpec::All);
        let mut ct = ColumnTransformer::new().add("inner", inner, vec!["a", "b"]);
        let frame = ct.fit_transform(&panel()).unwrap().into_frame().unwrap();
        assert_eq!(frame.shape(), (4, 1));
        assert_eq!(frame.cell(0, 0).unwrap().len(), 6);
    }

    #[test]
    fn test_column_transformer_transform_checks_columns() {
        let mut ct = ColumnTransformer::new().add("a", tabularize(), "a");
        ct.fit(&panel()).unwrap();

        let x = Panel::from(Array3::<f64>::zeros((2, 2, 3)));
        assert!(matches!(
            ct.transform(&x),
            Err(ComposeError::FeatureMismatch {
                expected_features: 3,
                got_features: 2
            })
        ));

        let x = Panel::from(Array3::<f64>::zeros((2, 3, 3)));
        assert!(matches!(
            ct.transform(&x),
            Err(ComposeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_column_transformer_accepts_array_input() {
        let x = Panel::from(Array3::from_elem((3, 2, 2), 1.0));
        let mut ct = ColumnTransformer::new().add("v", tabularize(), "var_1");
        let data = ct.fit_transform(&x).unwrap().to_array2().unwrap();
        assert_eq!(data, Array2::<f64>::ones((3, 2)));
        assert_eq!(ct.feature_names_in().unwrap(), &["var_0", "var_1"].map(String::from));
    }

    #[test]
    fn test_column_transformer_set_transformer() {
        let mut ct = ColumnTransformer::new().add("a", tabularize(), "a");
        ct.set_transformer("a", TransformerStep::Drop).unwrap();
        let data = ct.fit_transform(&panel()).unwrap().to_array2().unwrap();
        assert_eq!(data.dim(), (4, 0));
        assert!(matches!(
            ct.set_transformer("missing", TransformerStep::Drop),
            Err(ComposeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_column_transformer_params() {
        let mut ct = ColumnTransformer::new().add("a", tabularize(), "a");
        let mut params = ct.get_params();
        assert_eq!(params.sparse_threshold, 0.3);
        assert_eq!(params.n_jobs, 1);
        assert!(params.preserve_dataframe);

        params.sparse_threshold = 1.5;
        assert!(matches!(
            ct.set_params(params),
            Err(ComposeError::InvalidParameter(_))
        ));

        ct.set_params_json(serde_json::json!({
            "sparse_threshold": 0.1,
            "n_jobs": -1,
            "transformer_weights": { "a": 2.0 },
            "preserve_dataframe": false
        }))
        .unwrap();
        assert_eq!(ct.config().n_jobs, -1);
        assert_eq!(ct.get_params_json().unwrap()["transformer_weights"]["a"], 2.0);

        let result = ct.set_params_json(serde_json::json!({ "n_jobs": 1 }));
        assert!(matches!(result, Err(ComposeError::Serialization(_))));
    }

    #[test]
    fn test_column_transformer_invalid_n_jobs() {
        let mut ct = ColumnTransformer::new().add("a", tabularize(), "a").with_n_jobs(0);
        assert!(matches!(ct.fit(&panel()), Err(ComposeError::InvalidParameter(_))));
    }

    #[test]
    fn test_column_transformer_parallel_matches_sequential() {
        let build = |n_jobs| {
            ColumnTransformer::new()
                .add("a", tabularize(), "a")
                .add("shift", MeanShift::default(), vec!["b", "c"])
                .add_passthrough("c", "c")
                .with_transformer_weight("a", 3.0)
                .with_n_jobs(n_jobs)
        };
        let mut sequential = build(1);
        let mut parallel = build(-1);
        let mut two = build(2);
        let expected = sequential.fit_transform(&panel()).unwrap();
        assert_eq!(parallel.fit_transform(&panel()).unwrap(), expected);
        assert_eq!(two.fit_transform(&panel()).unwrap(), expected);
        assert_eq!(parallel.transform(&panel()).unwrap(), sequential.transform(&panel()).unwrap());
    }

    proptest! {
        #[test]
        fn prop_output_width_is_sum_of_entry_widths(
            d in 1usize..5,
            t in 1usize..5,
            mask in prop::collection::vec(any::<bool>(), 4),
            weight in 0.1f64..10.0,
        ) {
            let x = Panel::from(Array3::from_shape_fn((3, d, t), |(i, j, k)| (i + j + k) as f64));
            let selected: Vec<usize> = (0..d).filter(|&j| mask[j]).collect();
            let mut ct = ColumnTransformer::new()
                .add("sel", tabularize(), selected.clone())
                .add("all", tabularize(), ColumnSpec::All)
                .with_transformer_weight("all", weight);
            let data = ct.fit_transform(&x).unwrap().to_array2().unwrap();
            prop_assert_eq!(data.ncols(), selected.len() * t + d * t);
            prop_assert!((data[[2, selected.len() * t]] - 2.0 * weight).abs() < 1e-9);
        }
    }
}
