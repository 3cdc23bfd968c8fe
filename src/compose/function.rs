//! Stateless transformers built from closures.

use crate::error::Result;
use crate::output::Transformed;
use crate::panel::{array3_to_nested, Frame, Panel};
use crate::traits::{PanelTransformer, SeriesCapability, SeriesOutput, SeriesTransformer};
use ndarray::ArrayView2;
use std::fmt;
use std::sync::Arc;

type PanelFn = dyn Fn(&Frame) -> Result<Transformed> + Send + Sync;
type SeriesFn = dyn Fn(ArrayView2<'_, f64>) -> Result<SeriesOutput> + Send + Sync;

/// Panel transformer applying a function to the nested frame.
///
/// Without a function it is the identity and returns the input frame; the
/// column router uses it this way for `passthrough` entries.
#[derive(Clone, Default)]
pub struct FunctionTransformer {
    func: Option<Arc<PanelFn>>,
    is_fitted: bool,
}

impl FunctionTransformer {
    /// Identity transformer.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Frame) -> Result<Transformed> + Send + Sync + 'static,
    {
        Self {
            func: Some(Arc::new(func)),
            is_fitted: false,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.func.is_none()
    }
}

impl fmt::Debug for FunctionTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTransformer")
            .field("identity", &self.is_identity())
            .field("is_fitted", &self.is_fitted)
            .finish()
    }
}

impl PanelTransformer for FunctionTransformer {
    fn fit(&mut self, _x: &Panel) -> Result<()> {
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, x: &Panel) -> Result<Transformed> {
        self.check_is_fitted()?;
        let converted;
        let frame = match x {
            Panel::Frame(frame) => frame,
            Panel::Array(data) => {
                converted = array3_to_nested(data);
                &converted
            }
        };
        match &self.func {
            Some(func) => func(frame),
            None => Ok(Transformed::Frame(frame.clone())),
        }
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn name(&self) -> &'static str {
        "FunctionTransformer"
    }
}

/// Series transformer applying a function to one instance.
#[derive(Clone)]
pub struct SeriesFunctionTransformer {
    func: Arc<SeriesFn>,
    capability: Option<SeriesCapability>,
}

impl SeriesFunctionTransformer {
    /// Function producing a vector of scalars per instance.
    pub fn to_primitives<F>(func: F) -> Self
    where
        F: Fn(ArrayView2<'_, f64>) -> Result<SeriesOutput> + Send + Sync + 'static,
    {
        Self::with_capability(func, Some(SeriesCapability::SeriesToPrimitives))
    }

    /// Function producing a series per instance.
    pub fn to_series<F>(func: F) -> Self
    where
        F: Fn(ArrayView2<'_, f64>) -> Result<SeriesOutput> + Send + Sync + 'static,
    {
        Self::with_capability(func, Some(SeriesCapability::SeriesToSeries))
    }

    /// Function that declares no capability.
    pub fn undeclared<F>(func: F) -> Self
    where
        F: Fn(ArrayView2<'_, f64>) -> Result<SeriesOutput> + Send + Sync + 'static,
    {
        Self::with_capability(func, None)
    }

    fn with_capability<F>(func: F, capability: Option<SeriesCapability>) -> Self
    where
        F: Fn(ArrayView2<'_, f64>) -> Result<SeriesOutput> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            capability,
        }
    }
}

impl fmt::Debug for SeriesFunctionTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesFunctionTransformer")
            .field("capability", &self.capability)
            .finish()
    }
}

impl SeriesTransformer for SeriesFunctionTransformer {
    fn capability(&self) -> Option<SeriesCapability> {
        self.capability
    }

    fn fit(&mut self, _x: ArrayView2<'_, f64>) -> Result<()> {
        Ok(())
    }

    fn transform(&self, x: ArrayView2<'_, f64>) -> Result<SeriesOutput> {
        (self.func)(x)
    }

    fn name(&self) -> &'static str {
        "SeriesFunctionTransformer"
    }
}
