//! Input validation and coercion for panel data.
//!
//! Every adapter in this crate funnels its input through one of these
//! functions before doing any work, so malformed panels fail early and with
//! the same messages everywhere.

use super::convert::{array3_to_nested, nested_to_array3};
use super::frame::Frame;
use super::Panel;
use crate::error::{ComposeError, Result};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Constraints applied by [`check_panel`], [`check_frame`] and [`check_array`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Require exactly one variable.
    pub enforce_univariate: bool,
    /// Minimum number of instances.
    pub enforce_min_instances: usize,
    /// Minimum number of variables.
    pub enforce_min_columns: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            enforce_univariate: false,
            enforce_min_instances: 1,
            enforce_min_columns: 1,
        }
    }
}

impl CheckConfig {
    /// Set whether exactly one variable is required.
    pub fn with_univariate(mut self, enforce: bool) -> Self {
        self.enforce_univariate = enforce;
        self
    }

    /// Set the minimum number of instances.
    pub fn with_min_instances(mut self, n: usize) -> Self {
        self.enforce_min_instances = n;
        self
    }

    /// Set the minimum number of variables.
    pub fn with_min_columns(mut self, n: usize) -> Self {
        self.enforce_min_columns = n;
        self
    }
}

/// Validate a panel against `config` without converting it.
///
/// # Errors
/// - [`ComposeError::InvalidParameter`] if a frame has primitive columns (a
///   frame passed as a panel must be nested).
/// - [`ComposeError::EmptyData`] if there are fewer instances than required.
/// - [`ComposeError::InvalidShape`] if the variable count violates the
///   univariate or minimum-columns constraint.
pub fn check_panel(x: &Panel, config: &CheckConfig) -> Result<()> {
    if let Panel::Frame(frame) = x {
        if let Some((name, _)) = frame.iter().find(|(_, c)| !c.is_nested()) {
            return Err(ComposeError::InvalidParameter(format!(
                "If passed as a frame, X must be a nested frame with series inside cells; \
                 column '{}' holds scalars",
                name
            )));
        }
    }

    let n_instances = x.n_instances();
    if n_instances < config.enforce_min_instances {
        return Err(ComposeError::EmptyData(format!(
            "Found {} instance(s), but a minimum of {} is required",
            n_instances, config.enforce_min_instances
        )));
    }

    let n_columns = x.n_columns();
    if config.enforce_univariate && n_columns != 1 {
        return Err(ComposeError::InvalidShape {
            expected: "univariate data (1 column)".to_string(),
            got: format!("{} columns", n_columns),
        });
    }
    if n_columns < config.enforce_min_columns {
        return Err(ComposeError::InvalidShape {
            expected: format!("at least {} column(s)", config.enforce_min_columns),
            got: format!("{} columns", n_columns),
        });
    }
    Ok(())
}

/// Validate `x` and coerce it into nested-frame form.
pub fn check_frame<'a>(x: &'a Panel, config: &CheckConfig) -> Result<Cow<'a, Frame>> {
    check_panel(x, config)?;
    Ok(match x {
        Panel::Frame(frame) => Cow::Borrowed(frame),
        Panel::Array(data) => Cow::Owned(array3_to_nested(data)),
    })
}

/// Validate `x` and coerce it into a 3D array `(N, D, T)`.
///
/// # Errors
/// In addition to [`check_panel`]'s errors, returns
/// [`ComposeError::UnsupportedData`] if a nested frame holds series of
/// unequal length.
pub fn check_array<'a>(x: &'a Panel, config: &CheckConfig) -> Result<Cow<'a, Array3<f64>>> {
    check_panel(x, config)?;
    Ok(match x {
        Panel::Frame(frame) => Cow::Owned(nested_to_array3(frame)?),
        Panel::Array(data) => Cow::Borrowed(data),
    })
}
