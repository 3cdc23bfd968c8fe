//! Multivariate-to-univariate panel concatenation.

use crate::error::Result;
use crate::output::Transformed;
use crate::panel::{
    array3_to_tabular, check_panel, nested_to_tabular, tabular_to_nested, CheckConfig, Panel,
};
use crate::traits::{Estimator, PanelTransformer};

/// Concatenates the variables of every instance in time, turning a
/// multivariate panel into a univariate one.
///
/// Each instance's series are laid end to end, variable by variable, and the
/// result is returned as a nested frame with a single column named `0`.
///
/// # Example
/// ```ignore
/// let mut concat = ColumnConcatenator::new();
/// let out = concat.fit_transform(&Panel::from(cube))?; // (N, D, T) -> N × 1, cells of length D·T
/// ```
#[derive(Clone, Debug, Default)]
pub struct ColumnConcatenator {
    is_fitted: bool,
}

impl ColumnConcatenator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PanelTransformer for ColumnConcatenator {
    /// Validates `x`; nothing is learned.
    fn fit(&mut self, x: &Panel) -> Result<()> {
        check_panel(x, &CheckConfig::default())?;
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, x: &Panel) -> Result<Transformed> {
        self.check_is_fitted()?;
        check_panel(x, &CheckConfig::default())?;

        let tabular = match x {
            Panel::Frame(frame) => nested_to_tabular(frame)?,
            Panel::Array(data) => array3_to_tabular(data),
        };
        tracing::debug!(
            n_instances = tabular.nrows(),
            length = tabular.ncols(),
            "concatenated panel columns"
        );
        Ok(Transformed::Frame(tabular_to_nested(tabular.view(), "0")))
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

impl Estimator for ColumnConcatenator {
    type Params = ();

    fn get_params(&self) -> Self::Params {}

    fn set_params(&mut self, _params: Self::Params) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComposeError;
    use crate::panel::Frame;
    use ndarray::{array, Array3};
    use proptest::prelude::*;

    #[test]
    fn test_concatenator_nested_input() {
        let frame = Frame::from_nested(vec![
            ("a", vec![array![1.0, 2.0], array![3.0, 4.0]]),
            ("b", vec![array![5.0, 6.0, 7.0], array![8.0, 9.0, 10.0]]),
        ])
        .unwrap();
        let mut concat = ColumnConcatenator::new();
        let out = concat.fit_transform(&Panel::from(frame)).unwrap();
        let out = out.into_frame().unwrap();
        assert_eq!(out.shape(), (2, 1));
        assert_eq!(out.names(), &["0".to_string()]);
        assert_eq!(
            out.cell(1, 0).unwrap(),
            array![3.0, 4.0, 8.0, 9.0, 10.0].view()
        );
    }

    #[test]
    fn test_concatenator_requires_fit() {
        let concat = ColumnConcatenator::new();
        let x = Panel::from(Array3::<f64>::zeros((2, 2, 2)));
        assert!(matches!(
            concat.transform(&x),
            Err(ComposeError::NotFitted { .. })
        ));
    }

    #[test]
    fn test_concatenator_unequal_lengths() {
        let frame = Frame::from_nested(vec![("a", vec![array![1.0, 2.0], array![3.0]])]).unwrap();
        let x = Panel::from(frame);
        let mut concat = ColumnConcatenator::new();
        assert!(matches!(
            concat.fit_transform(&x),
            Err(ComposeError::UnsupportedData(_))
        ));
    }

    #[test]
    fn test_concatenator_rejects_primitive_frame() {
        let frame = Frame::from_array(&array![[1.0, 2.0]], None).unwrap();
        let mut concat = ColumnConcatenator::new();
        assert!(matches!(
            concat.fit(&Panel::from(frame)),
            Err(ComposeError::InvalidParameter(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_concatenator_single_column(n in 1usize..6, d in 1usize..5, t in 1usize..7) {
            let cube = Array3::from_shape_fn((n, d, t), |(i, j, k)| (i * 100 + j * 10 + k) as f64);
            let mut concat = ColumnConcatenator::new();
            let out = concat.fit_transform(&Panel::from(cube.clone())).unwrap();
            let frame = out.into_frame().unwrap();
            prop_assert_eq!(frame.shape(), (n, 1));
            for i in 0..n {
                let cell = frame.cell(i, 0).unwrap();
                prop_assert_eq!(cell.len(), d * t);
                for c in 0..d * t {
                    prop_assert_eq!(cell[c], cube[[i, c / t, c % t]]);
                }
            }
        }
    }
}
