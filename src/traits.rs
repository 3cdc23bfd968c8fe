//! Core traits for panel and series transformers.
//!
//! This module defines the capability traits every adapter consumes:
//! - [`PanelTransformer`]: fit/transform on whole panels; object safe, so
//!   heterogeneous transformers can be stored as `Box<dyn PanelTransformer>`.
//! - [`SeriesTransformer`]: fit/transform on a single instance (a `T × D`
//!   matrix); used as the template of the row broadcasters.
//! - [`Estimator`]: typed and JSON access to hyperparameters.

use crate::error::{ComposeError, Result};
use crate::output::Transformed;
use crate::panel::Panel;
use ndarray::{Array1, Array2, ArrayView2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::type_name;
use std::fmt;
use std::str::FromStr;

/// Strip the module path and generic arguments from a type name.
pub(crate) fn short_type_name(full_name: &'static str) -> &'static str {
    let before_generic = match full_name.find('<') {
        Some(pos) => &full_name[..pos],
        None => full_name,
    };
    match before_generic.rfind("::") {
        Some(pos) => &before_generic[pos + 2..],
        None => before_generic,
    }
}

/// What a series transformer produces from one instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesCapability {
    /// A series in, a (possibly multivariate) series out.
    SeriesToSeries,
    /// A series in, a fixed vector of scalars out.
    SeriesToPrimitives,
}

impl SeriesCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesCapability::SeriesToSeries => "series-to-series",
            SeriesCapability::SeriesToPrimitives => "series-to-primitives",
        }
    }
}

impl fmt::Display for SeriesCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesCapability {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "series-to-series" => Ok(SeriesCapability::SeriesToSeries),
            "series-to-primitives" => Ok(SeriesCapability::SeriesToPrimitives),
            other => Err(ComposeError::InvalidParameter(format!(
                "transformer_type must be one of [\"series-to-series\", \"series-to-primitives\"], \
                 got '{}'",
                other
            ))),
        }
    }
}

/// Input/output kind of a panel transformer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelScitype {
    /// Panel in, panel out.
    PanelToPanel,
    /// Panel in, one row of features per instance out.
    PanelToTabular,
}

/// Explicit cloning into a boxed trait object.
///
/// Blanket-implemented for every `Clone` transformer, so implementors only
/// need `#[derive(Clone)]`.
pub trait PanelTransformerClone {
    fn clone_box(&self) -> Box<dyn PanelTransformer>;
}

impl<T> PanelTransformerClone for T
where
    T: PanelTransformer + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn PanelTransformer> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn PanelTransformer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl fmt::Debug for dyn PanelTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(fitted={})", self.name(), self.is_fitted())
    }
}

/// Transformer operating on whole panels.
///
/// # Example
/// ```ignore
/// use panel_compose::{ColumnConcatenator, PanelTransformer};
///
/// let mut concat = ColumnConcatenator::new();
/// let univariate = concat.fit_transform(&panel)?;
/// ```
pub trait PanelTransformer: PanelTransformerClone + Send + Sync {
    /// Learn whatever the transformer needs from `x`.
    ///
    /// # Errors
    /// Returns [`ComposeError`] if `x` fails validation or the configuration
    /// is invalid.
    fn fit(&mut self, x: &Panel) -> Result<()>;

    /// Transform `x` using the state learned in [`fit`](Self::fit).
    ///
    /// # Errors
    /// Returns [`ComposeError::NotFitted`] if called before `fit`.
    fn transform(&self, x: &Panel) -> Result<Transformed>;

    /// Fit on `x`, then transform it.
    fn fit_transform(&mut self, x: &Panel) -> Result<Transformed> {
        self.fit(x)?;
        self.transform(x)
    }

    fn is_fitted(&self) -> bool;

    /// Fail with [`ComposeError::NotFitted`] unless fitted.
    fn check_is_fitted(&self) -> Result<()> {
        if self.is_fitted() {
            Ok(())
        } else {
            Err(ComposeError::NotFitted {
                estimator: self.name().to_string(),
            })
        }
    }

    fn scitype(&self) -> PanelScitype {
        PanelScitype::PanelToPanel
    }

    /// Whether fitting is deferred to `transform` (fit is then trivial).
    fn fit_in_transform(&self) -> bool {
        false
    }

    /// Short type name used in errors and logs.
    fn name(&self) -> &'static str {
        short_type_name(type_name::<Self>())
    }

    /// Consume the transformer and return it fitted.
    fn fitted(mut self, x: &Panel) -> Result<Self>
    where
        Self: Sized,
    {
        self.fit(x)?;
        Ok(self)
    }
}

/// Output of a series transformer applied to one instance.
#[derive(Clone, Debug, PartialEq)]
pub enum SeriesOutput {
    /// A vector of `k` scalars.
    Primitives(Array1<f64>),
    /// A `T' × D'` series (time along rows, variables along columns).
    Series(Array2<f64>),
}

/// Explicit cloning into a boxed trait object, see [`PanelTransformerClone`].
pub trait SeriesTransformerClone {
    fn clone_box(&self) -> Box<dyn SeriesTransformer>;
}

impl<T> SeriesTransformerClone for T
where
    T: SeriesTransformer + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn SeriesTransformer> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn SeriesTransformer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl fmt::Debug for dyn SeriesTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.capability() {
            Some(capability) => write!(f, "{}({})", self.name(), capability),
            None => write!(f, "{}", self.name()),
        }
    }
}

/// Transformer operating on a single instance, given as a `T × D` matrix.
pub trait SeriesTransformer: SeriesTransformerClone + Send + Sync {
    /// Declared capability; `None` when the transformer does not say.
    fn capability(&self) -> Option<SeriesCapability> {
        None
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<()>;

    fn transform(&self, x: ArrayView2<'_, f64>) -> Result<SeriesOutput>;

    fn fit_transform(&mut self, x: ArrayView2<'_, f64>) -> Result<SeriesOutput> {
        self.fit(x)?;
        self.transform(x)
    }

    fn name(&self) -> &'static str {
        short_type_name(type_name::<Self>())
    }
}

/// Hyperparameter access.
///
/// `set_params` re-runs any validation the estimator performs at
/// construction.
pub trait Estimator {
    type Params: Serialize + DeserializeOwned + Clone;

    fn get_params(&self) -> Self::Params;

    fn set_params(&mut self, params: Self::Params) -> Result<()>;

    /// Parameters as a JSON value.
    fn get_params_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.get_params())?)
    }

    /// Set parameters from a JSON value.
    fn set_params_json(&mut self, value: serde_json::Value) -> Result<()> {
        let params: Self::Params = serde_json::from_value(value)?;
        self.set_params(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_type_name() {
        assert_eq!(
            short_type_name("panel_compose::compose::ColumnTransformer"),
            "ColumnTransformer"
        );
        assert_eq!(short_type_name("a::b::Wrapper<c::D>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn test_series_capability_from_str() {
        assert_eq!(
            "series-to-series".parse::<SeriesCapability>().unwrap(),
            SeriesCapability::SeriesToSeries
        );
        assert_eq!(
            "series-to-primitives".parse::<SeriesCapability>().unwrap(),
            SeriesCapability::SeriesToPrimitives
        );
        assert!(matches!(
            "series-to-panel".parse::<SeriesCapability>(),
            Err(ComposeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_series_capability_serde_matches_display() {
        let json = serde_json::to_string(&SeriesCapability::SeriesToPrimitives).unwrap();
        assert_eq!(json, "\"series-to-primitives\"");
        let back: SeriesCapability = serde_json::from_str("\"series-to-series\"").unwrap();
        assert_eq!(back.to_string(), "series-to-series");
    }
}
