use crate::error::{ComposeError, Result};
use crate::output::Transformed;
use crate::panel::{check_array, CheckConfig, Column, Frame, Panel};
use crate::traits::{
    Estimator, PanelScitype, PanelTransformer, SeriesCapability, SeriesOutput, SeriesTransformer,
};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Configuration shared by both row broadcasters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowTransformerConfig {
    /// Reject templates whose declared capability differs from the
    /// broadcaster's.
    pub check_transformer: bool,
}

impl Default for RowTransformerConfig {
    fn default() -> Self {
        Self {
            check_transformer: true,
        }
    }
}

impl RowTransformerConfig {
    pub fn with_check_transformer(mut self, check: bool) -> Self {
        self.check_transformer = check;
        self
    }
}

/// Template plus configuration; the per-instance loop lives here.
#[derive(Clone, Debug)]
struct RowBroadcast {
    transformer: Box<dyn SeriesTransformer>,
    config: RowTransformerConfig,
    required: SeriesCapability,
    is_fitted: bool,
}

impl RowBroadcast {
    fn new(
        transformer: Box<dyn SeriesTransformer>,
        config: RowTransformerConfig,
        required: SeriesCapability,
    ) -> Result<Self> {
        let broadcast = Self {
            transformer,
            config,
            required,
            is_fitted: false,
        };
        broadcast.check_transformer()?;
        Ok(broadcast)
    }

    fn check_transformer(&self) -> Result<()> {
        if self.config.check_transformer && self.transformer.capability() != Some(self.required) {
            return Err(ComposeError::TypeMismatch {
                required: self.required,
            });
        }
        Ok(())
    }

    fn set_config(&mut self, config: RowTransformerConfig) -> Result<()> {
        let previous = std::mem::replace(&mut self.config, config);
        if let Err(e) = self.check_transformer() {
            self.config = previous;
            return Err(e);
        }
        Ok(())
    }

    fn set_transformer(&mut self, transformer: Box<dyn SeriesTransformer>) -> Result<()> {
        let previous = std::mem::replace(&mut self.transformer, transformer);
        if let Err(e) = self.check_transformer() {
            self.transformer = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Clone the template once per instance and fit-transform it on that
    /// instance (as a `T × D` matrix). Outputs are in instance order.
    fn apply(&self, x: &Panel) -> Result<Vec<SeriesOutput>> {
        let data = check_array(x, &CheckConfig::default())?;
        let n_instances = data.len_of(Axis(0));
        tracing::debug!(
            transformer = self.transformer.name(),
            n_instances,
            "broadcasting series transformer over instances"
        );

        let mut outputs = Vec::with_capacity(n_instances);
        for (i, instance) in data.outer_iter().enumerate() {
            let mut transformer = self.transformer.clone_box();
            let output = transformer.fit_transform(instance.t())?;
            tracing::trace!(instance = i, "transformed instance");
            outputs.push(output);
        }
        Ok(outputs)
    }
}

/// Applies a series-to-primitives transformer to every instance.
///
/// The result is a tabular frame with one row per instance and one primitive
/// column per produced value, named `0`, `1`, ...
#[derive(Clone, Debug)]
pub struct SeriesToPrimitivesRowTransformer {
    inner: RowBroadcast,
}

impl SeriesToPrimitivesRowTransformer {
    /// # Errors
    /// Returns [`ComposeError::TypeMismatch`] if checking is enabled and the
    /// template is not a series-to-primitives transformer.
    pub fn new<T: SeriesTransformer + 'static>(transformer: T) -> Result<Self> {
        Self::from_boxed(Box::new(transformer), RowTransformerConfig::default())
    }

    /// Like `new`, with an explicit configuration.
    pub fn with_config<T: SeriesTransformer + 'static>(
        transformer: T,
        config: RowTransformerConfig,
    ) -> Result<Self> {
        Self::from_boxed(Box::new(transformer), config)
    }

    /// Build from an already boxed template.
    pub fn from_boxed(
        transformer: Box<dyn SeriesTransformer>,
        config: RowTransformerConfig,
    ) -> Result<Self> {
        Ok(Self {
            inner: RowBroadcast::new(transformer, config, SeriesCapability::SeriesToPrimitives)?,
        })
    }

    /// The template transformer.
    pub fn transformer(&self) -> &dyn SeriesTransformer {
        self.inner.transformer.as_ref()
    }

    /// Replace the template, re-running the capability check.
    pub fn set_transformer(&mut self, transformer: Box<dyn SeriesTransformer>) -> Result<()> {
        self.inner.set_transformer(transformer)
    }
}

impl PanelTransformer for SeriesToPrimitivesRowTransformer {
    fn fit(&mut self, _x: &Panel) -> Result<()> {
        self.inner.is_fitted = true;
        Ok(())
    }

    fn transform(&self, x: &Panel) -> Result<Transformed> {
        self.check_is_fitted()?;
        let outputs = self.inner.apply(x)?;

        let rows: Vec<Array1<f64>> = outputs
            .into_iter()
            .map(|output| match output {
                SeriesOutput::Primitives(values) => values,
                SeriesOutput::Series(series) => series.iter().copied().collect(),
            })
            .collect();

        let width = rows.first().map_or(0, |r| r.len());
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(ComposeError::InvalidShape {
                expected: format!("{} values for every instance", width),
                got: format!("{} values for instance {}", row.len(), i),
            });
        }

        let mut table = Array2::zeros((rows.len(), width));
        for (mut out, row) in table.outer_iter_mut().zip(&rows) {
            out.assign(row);
        }
        Ok(Transformed::Frame(Frame::from_array(&table, None)?))
    }

    fn is_fitted(&self) -> bool {
        self.inner.is_fitted
    }

    fn scitype(&self) -> PanelScitype {
        PanelScitype::PanelToTabular
    }

    fn fit_in_transform(&self) -> bool {
        true
    }
}

impl Estimator for SeriesToPrimitivesRowTransformer {
    type Params = RowTransformerConfig;

    fn get_params(&self) -> Self::Params {
        self.inner.config.clone()
    }

    fn set_params(&mut self, params: Self::Params) -> Result<()> {
        self.inner.set_config(params)
    }
}

/// Applies a series-to-series transformer to every instance.
///
/// Cell `(i, j)` of the nested result holds variable `j` of the output for
/// instance `i`. Instances may produce different numbers of variables; cells
/// an instance did not produce hold empty series.
#[derive(Clone, Debug)]
pub struct SeriesToSeriesRowTransformer {
    inner: RowBroadcast,
}

impl SeriesToSeriesRowTransformer {
    /// # Errors
    /// Returns [`ComposeError::TypeMismatch`] if checking is enabled and the
    /// template is not a series-to-series transformer.
    pub fn new<T: SeriesTransformer + 'static>(transformer: T) -> Result<Self> {
        Self::from_boxed(Box::new(transformer), RowTransformerConfig::default())
    }

    /// Like `new`, with an explicit configuration.
    pub fn with_config<T: SeriesTransformer + 'static>(
        transformer: T,
        config: RowTransformerConfig,
    ) -> Result<Self> {
        Self::from_boxed(Box::new(transformer), config)
    }

    /// Build from an already boxed template.
    pub fn from_boxed(
        transformer: Box<dyn SeriesTransformer>,
        config: RowTransformerConfig,
    ) -> Result<Self> {
        Ok(Self {
            inner: RowBroadcast::new(transformer, config, SeriesCapability::SeriesToSeries)?,
        })
    }

    /// The template transformer.
    pub fn transformer(&self) -> &dyn SeriesTransformer {
        self.inner.transformer.as_ref()
    }

    /// Replace the template, re-running the capability check.
    pub fn set_transformer(&mut self, transformer: Box<dyn SeriesTransformer>) -> Result<()> {
        self.inner.set_transformer(transformer)
    }
}

impl PanelTransformer for SeriesToSeriesRowTransformer {
    fn fit(&mut self, _x: &Panel) -> Result<()> {
        self.inner.is_fitted = true;
        Ok(())
    }

    fn transform(&self, x: &Panel) -> Result<Transformed> {
        self.check_is_fitted()?;
        let outputs = self.inner.apply(x)?;
        let n_instances = outputs.len();

        let series: Vec<Array2<f64>> = outputs
            .into_iter()
            .map(|output| match output {
                SeriesOutput::Series(series) => series,
                SeriesOutput::Primitives(values) => values.insert_axis(Axis(1)),
            })
            .collect();

        let width = series.iter().map(|s| s.ncols()).max().unwrap_or(0);
        let mut frame = Frame::with_rows(n_instances);
        for j in 0..width {
            let cells = series
                .iter()
                .map(|s| {
                    if j < s.ncols() {
                        s.column(j).to_owned()
                    } else {
                        Array1::zeros(0)
                    }
                })
                .collect();
            frame.push_column(j.to_string(), Column::Nested(cells))?;
        }
        Ok(Transformed::Frame(frame))
    }

    fn is_fitted(&self) -> bool {
        self.inner.is_fitted
    }

    fn fit_in_transform(&self) -> bool {
        true
    }
}

impl Estimator for SeriesToSeriesRowTransformer {
    type Params = RowTransformerConfig;

    fn get_params(&self) -> Self::Params {
        self.inner.config.clone()
    }

    fn set_params(&mut self, params: Self::Params) -> Result<()> {
        self.inner.set_config(params)
    }
}

/// A row broadcaster whose variant was picked by [`make_row_transformer`].
#[derive(Clone, Debug)]
pub enum RowTransformer {
    SeriesToPrimitives(SeriesToPrimitivesRowTransformer),
    SeriesToSeries(SeriesToSeriesRowTransformer),
}

impl RowTransformer {
    /// The capability this broadcaster was built for.
    pub fn capability(&self) -> SeriesCapability {
        match self {
            RowTransformer::SeriesToPrimitives(_) => SeriesCapability::SeriesToPrimitives,
            RowTransformer::SeriesToSeries(_) => SeriesCapability::SeriesToSeries,
        }
    }

    fn as_transformer(&self) -> &dyn PanelTransformer {
        match self {
            RowTransformer::SeriesToPrimitives(t) => t,
            RowTransformer::SeriesToSeries(t) => t,
        }
    }

    fn as_transformer_mut(&mut self) -> &mut dyn PanelTransformer {
        match self {
            RowTransformer::SeriesToPrimitives(t) => t,
            RowTransformer::SeriesToSeries(t) => t,
        }
    }
}

impl PanelTransformer for RowTransformer {
    fn fit(&mut self, x: &Panel) -> Result<()> {
        self.as_transformer_mut().fit(x)
    }

    fn transform(&self, x: &Panel) -> Result<Transformed> {
        self.as_transformer().transform(x)
    }

    fn is_fitted(&self) -> bool {
        self.as_transformer().is_fitted()
    }

    fn scitype(&self) -> PanelScitype {
        self.as_transformer().scitype()
    }

    fn fit_in_transform(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        self.as_transformer().name()
    }
}

impl Estimator for RowTransformer {
    type Params = RowTransformerConfig;

    fn get_params(&self) -> Self::Params {
        match self {
            RowTransformer::SeriesToPrimitives(t) => t.get_params(),
            RowTransformer::SeriesToSeries(t) => t.get_params(),
        }
    }

    fn set_params(&mut self, params: Self::Params) -> Result<()> {
        match self {
            RowTransformer::SeriesToPrimitives(t) => t.set_params(params),
            RowTransformer::SeriesToSeries(t) => t.set_params(params),
        }
    }
}

/// Decide which broadcaster a template needs.
///
/// An explicit `transformer_type` (`"series-to-series"` or
/// `"series-to-primitives"`) wins; otherwise the template's declared
/// capability decides.
///
/// # Errors
/// - [`ComposeError::InvalidParameter`] for any other `transformer_type`.
/// - [`ComposeError::TypeResolution`] if no type is given and the template
///   declares none.
pub fn resolve_row_capability(
    template: &dyn SeriesTransformer,
    transformer_type: Option<&str>,
) -> Result<SeriesCapability> {
    match transformer_type {
        Some(kind) => kind.parse(),
        None => template.capability().ok_or(ComposeError::TypeResolution),
    }
}

/// Build the row broadcaster matching `template`.
///
/// # Example
/// ```ignore
/// let rt = make_row_transformer(summary, None, RowTransformerConfig::default())?;
/// assert_eq!(rt.capability(), SeriesCapability::SeriesToPrimitives);
/// ```
pub fn make_row_transformer<T: SeriesTransformer + 'static>(
    template: T,
    transformer_type: Option<&str>,
    config: RowTransformerConfig,
) -> Result<RowTransformer> {
    let capability = resolve_row_capability(&template, transformer_type)?;
    let template: Box<dyn SeriesTransformer> = Box::new(template);
    Ok(match capability {
        SeriesCapability::SeriesToSeries => RowTransformer::SeriesToSeries(
            SeriesToSeriesRowTransformer::from_boxed(template, config)?,
        ),
        SeriesCapability::SeriesToPrimitives => RowTransformer::SeriesToPrimitives(
            SeriesToPrimitivesRowTransformer::from_boxed(template, config)?,
        ),
    })
}
