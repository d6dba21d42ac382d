//! Grain-aware rolling window featurizer
//!
//! For each row the output is a `Float64` tensor of shape `[1, horizon]`.
//! Slice `c` aggregates up to `max_window_size` earlier values of the same
//! grain, the newest of which lies `horizon - c` rows before the current
//! row. Slice `horizon - 1` is therefore the classic trailing window and
//! lower slices look further back, one row per step. NaN inputs are not
//! counted; a window with fewer than `min_window_size` values yields NaN.

use std::collections::{BTreeMap, VecDeque};

use featurize_core::error::{Error, Result};
use featurize_core::schema::DataType;
use featurize_core::source::DataView;
use featurize_core::transform::{Input, Transformer};
use serde::{Deserialize, Serialize};

use crate::column::{fit_column, ColumnBinding, ColumnTransformer};
use crate::estimator::OnePassEstimator;

/// Aggregation applied to each window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowCalculation {
    /// Arithmetic mean
    #[default]
    Mean,
    /// Minimum
    Min,
    /// Maximum
    Max,
}

impl WindowCalculation {
    fn apply(self, values: impl Iterator<Item = f64>) -> (usize, f64) {
        let mut count = 0;
        let mut acc = match self {
            Self::Mean => 0.0,
            Self::Min => f64::INFINITY,
            Self::Max => f64::NEG_INFINITY,
        };
        for value in values.filter(|v| !v.is_nan()) {
            count += 1;
            acc = match self {
                Self::Mean => acc + value,
                Self::Min => acc.min(value),
                Self::Max => acc.max(value),
            };
        }
        if self == Self::Mean && count > 0 {
            #[allow(clippy::cast_precision_loss)]
            let n = count as f64;
            acc /= n;
        }
        (count, acc)
    }
}

/// Configuration of the rolling window featurizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingWindowOptions {
    /// Numeric column aggregated over
    pub input_column: String,

    /// Name of the output tensor column
    pub output_column: String,

    /// Columns identifying a grain
    pub grain_columns: Vec<String>,

    /// Aggregation to apply
    pub calculation: WindowCalculation,

    /// Number of slices produced per row
    pub horizon: usize,

    /// Largest number of values in a window
    pub max_window_size: usize,

    /// Smallest number of values for a window to produce a result
    pub min_window_size: usize,
}

impl Default for RollingWindowOptions {
    fn default() -> Self {
        Self {
            input_column: String::new(),
            output_column: String::new(),
            grain_columns: Vec::new(),
            calculation: WindowCalculation::Mean,
            horizon: 1,
            max_window_size: 1,
            min_window_size: 1,
        }
    }
}

impl RollingWindowOptions {
    /// Options aggregating `input_column` into `output_column`
    pub fn new(input_column: &str, output_column: &str) -> Self {
        Self {
            input_column: input_column.to_string(),
            output_column: output_column.to_string(),
            ..Self::default()
        }
    }

    /// Check the options for configuration errors
    pub fn validate(&self) -> Result<()> {
        if self.input_column.is_empty() {
            return Err(Error::InvalidArgument("input column is required".into()));
        }
        if self.output_column.is_empty() {
            return Err(Error::InvalidArgument("output column is required".into()));
        }
        window_span(self.horizon, self.max_window_size, self.min_window_size)?;
        Ok(())
    }

    /// The estimator training this featurizer
    pub fn estimator(&self) -> Result<OnePassEstimator<RollingWindowTransformer>> {
        self.validate()?;
        Ok(OnePassEstimator::new(RollingWindowTransformer {
            calculation: self.calculation,
            horizon: self.horizon,
            max_window_size: self.max_window_size,
            min_window_size: self.min_window_size,
            history: BTreeMap::new(),
        }))
    }

    /// Fit on `view`
    pub fn fit(&self, view: &dyn DataView) -> Result<ColumnTransformer<RollingWindowTransformer>> {
        let binding = ColumnBinding {
            input_column: Some(self.input_column.clone()),
            grain_columns: self.grain_columns.clone(),
            output_column: self.output_column.clone(),
        };
        fit_column(self.estimator()?, view, binding)
    }
}

/// Number of earlier values a grain has to keep, checking the window sizes
fn window_span(horizon: usize, max_window_size: usize, min_window_size: usize) -> Result<usize> {
    if horizon == 0 {
        return Err(Error::InvalidArgument("horizon must be at least 1".into()));
    }
    if max_window_size == 0 {
        return Err(Error::InvalidArgument(
            "max window size must be at least 1".into(),
        ));
    }
    if min_window_size == 0 || min_window_size > max_window_size {
        return Err(Error::InvalidArgument(format!(
            "min window size must be between 1 and {}",
            max_window_size
        )));
    }
    horizon
        .checked_add(max_window_size - 1)
        .ok_or_else(|| Error::InvalidArgument("horizon and window size are too large".into()))
}

/// Finalized rolling window computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindowTransformer {
    calculation: WindowCalculation,
    horizon: usize,
    max_window_size: usize,
    min_window_size: usize,

    /// Earlier values per grain, newest first
    history: BTreeMap<Vec<String>, VecDeque<f64>>,
}

impl RollingWindowTransformer {
    fn capacity(&self) -> Result<usize> {
        window_span(self.horizon, self.max_window_size, self.min_window_size)
    }
}

impl Transformer for RollingWindowTransformer {
    const KIND: &'static str = "rolling_window";

    type Value = f64;
    type Output = Vec<f64>;

    fn output_type(&self) -> DataType {
        DataType::f64_tensor(vec![1, self.horizon])
    }

    fn transform(&mut self, input: &Input<f64>) -> Result<Vec<f64>> {
        let capacity = self.capacity()?;
        let history = self.history.entry(input.grains.clone()).or_default();

        let slices = (0..self.horizon)
            .map(|slice| {
                let skip = self.horizon - slice - 1;
                let window = history.iter().skip(skip).take(self.max_window_size).copied();
                match self.calculation.apply(window) {
                    (count, value) if count >= self.min_window_size => value,
                    _ => f64::NAN,
                }
            })
            .collect();

        history.push_front(input.value);
        history.truncate(capacity);
        Ok(slices)
    }

    fn validate(&self) -> Result<()> {
        self.capacity().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn transformer(options: &RollingWindowOptions) -> RollingWindowTransformer {
        let mut estimator = options.estimator().unwrap();
        featurize_core::Estimator::create_transformer(&mut estimator).unwrap()
    }

    fn run(transformer: &mut RollingWindowTransformer, rows: &[(&str, f64)]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|&(grain, value)| {
                transformer
                    .transform(&Input::new(vec![grain.to_string()], value))
                    .unwrap()
            })
            .collect()
    }

    fn assert_slices(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!(
                (a.is_nan() && e.is_nan()) || (a - e).abs() < 1e-12,
                "{:?} != {:?}",
                actual,
                expected
            );
        }
    }

    #[test]
    fn test_trailing_window_of_one() {
        let mut t = transformer(&RollingWindowOptions::new("x", "y"));
        let out = run(&mut t, &[("a", 1.0), ("a", 2.0), ("a", 3.0), ("a", 4.0)]);
        assert_slices(&out[0], &[f64::NAN]);
        assert_slices(&out[1], &[1.0]);
        assert_slices(&out[2], &[2.0]);
        assert_slices(&out[3], &[3.0]);
    }

    #[test]
    fn test_horizon_two_looks_further_back() {
        let options = RollingWindowOptions {
            horizon: 2,
            ..RollingWindowOptions::new("x", "y")
        };
        let mut t = transformer(&options);
        let out = run(&mut t, &[("a", 1.0), ("a", 2.0), ("a", 3.0)]);
        assert_slices(&out[0], &[f64::NAN, f64::NAN]);
        assert_slices(&out[1], &[f64::NAN, 1.0]);
        assert_slices(&out[2], &[1.0, 2.0]);
    }

    #[test_case(WindowCalculation::Mean, 2.5 ; "mean")]
    #[test_case(WindowCalculation::Min, 2.0 ; "min")]
    #[test_case(WindowCalculation::Max, 3.0 ; "max")]
    fn test_calculation(calculation: WindowCalculation, expected: f64) {
        let options = RollingWindowOptions {
            calculation,
            max_window_size: 2,
            min_window_size: 2,
            ..RollingWindowOptions::new("x", "y")
        };
        let mut t = transformer(&options);
        let out = run(&mut t, &[("a", 1.0), ("a", 2.0), ("a", 3.0), ("a", 9.0)]);
        assert!(out[1][0].is_nan());
        assert_slices(&out[3], &[expected]);
    }

    #[test]
    fn test_grains_are_independent() {
        let mut t = transformer(&RollingWindowOptions::new("x", "y"));
        let out = run(&mut t, &[("a", 1.0), ("b", 10.0), ("a", 2.0), ("b", 20.0)]);
        assert!(out[1][0].is_nan());
        assert_slices(&out[2], &[1.0]);
        assert_slices(&out[3], &[10.0]);
    }

    #[test]
    fn test_nan_inputs_are_not_counted() {
        let options = RollingWindowOptions {
            max_window_size: 2,
            min_window_size: 2,
            ..RollingWindowOptions::new("x", "y")
        };
        let mut t = transformer(&options);
        let out = run(&mut t, &[("a", 1.0), ("a", f64::NAN), ("a", 3.0)]);
        assert!(out[2][0].is_nan());
    }

    #[test_case(RollingWindowOptions { horizon: 0, ..RollingWindowOptions::new("x", "y") } ; "zero horizon")]
    #[test_case(RollingWindowOptions { max_window_size: 0, min_window_size: 0, ..RollingWindowOptions::new("x", "y") } ; "zero window")]
    #[test_case(RollingWindowOptions { max_window_size: 2, min_window_size: 3, ..RollingWindowOptions::new("x", "y") } ; "min above max")]
    #[test_case(RollingWindowOptions::new("", "y") ; "missing input")]
    #[test_case(RollingWindowOptions::new("x", "") ; "missing output")]
    fn test_validate_rejects(options: RollingWindowOptions) {
        assert!(matches!(options.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_load_rejects_invalid_state() {
        let zeros = RollingWindowTransformer {
            calculation: WindowCalculation::Mean,
            horizon: 0,
            max_window_size: 0,
            min_window_size: 0,
            history: BTreeMap::new(),
        };
        let bytes = featurize_core::state::save_transformer(&zeros).unwrap();
        assert!(matches!(
            featurize_core::state::load_transformer::<RollingWindowTransformer>(&bytes),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_huge_sizes_are_rejected() {
        let options = RollingWindowOptions {
            horizon: usize::MAX,
            max_window_size: 2,
            ..RollingWindowOptions::new("x", "y")
        };
        assert!(matches!(options.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_output_type() {
        let options = RollingWindowOptions {
            horizon: 3,
            ..RollingWindowOptions::new("x", "y")
        };
        assert_eq!(
            transformer(&options).output_type(),
            DataType::f64_tensor(vec![1, 3])
        );
    }
}
