//! Grain-aware lag featurizer
//!
//! Output is a `Float64` tensor of shape `[lags.len(), horizon]`. Row `r`
//! slice `c` holds the value `lags[r] + (horizon - c) - 1` rows before the
//! current row within the same grain, or NaN when the grain is not that
//! long yet.

use std::collections::{BTreeMap, VecDeque};

use featurize_core::error::{Error, Result};
use featurize_core::schema::DataType;
use featurize_core::source::DataView;
use featurize_core::transform::{Input, Transformer};
use serde::{Deserialize, Serialize};

use crate::column::{fit_column, ColumnBinding, ColumnTransformer};
use crate::estimator::OnePassEstimator;

/// Configuration of the lag featurizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagOptions {
    /// Numeric column to lag
    pub input_column: String,

    /// Name of the output tensor column
    pub output_column: String,

    /// Columns identifying a grain
    pub grain_columns: Vec<String>,

    /// Offsets, in rows, each at least 1
    pub lags: Vec<usize>,

    /// Number of slices produced per row
    pub horizon: usize,
}

impl Default for LagOptions {
    fn default() -> Self {
        Self {
            input_column: String::new(),
            output_column: String::new(),
            grain_columns: Vec::new(),
            lags: vec![1],
            horizon: 1,
        }
    }
}

impl LagOptions {
    /// Options lagging `input_column` into `output_column`
    pub fn new(input_column: &str, output_column: &str, lags: Vec<usize>) -> Self {
        Self {
            input_column: input_column.to_string(),
            output_column: output_column.to_string(),
            lags,
            ..Self::default()
        }
    }

    /// Check the options for configuration errors
    pub fn validate(&self) -> Result<()> {
        if self.input_column.is_empty() || self.output_column.is_empty() {
            return Err(Error::InvalidArgument(
                "input and output columns are required".into(),
            ));
        }
        history_len(&self.lags, self.horizon)?;
        Ok(())
    }

    /// The estimator training this featurizer
    pub fn estimator(&self) -> Result<OnePassEstimator<LagTransformer>> {
        self.validate()?;
        Ok(OnePassEstimator::new(LagTransformer {
            lags: self.lags.clone(),
            horizon: self.horizon,
            history: BTreeMap::new(),
        }))
    }

    /// Fit on `view`
    pub fn fit(&self, view: &dyn DataView) -> Result<ColumnTransformer<LagTransformer>> {
        let binding = ColumnBinding {
            input_column: Some(self.input_column.clone()),
            grain_columns: self.grain_columns.clone(),
            output_column: self.output_column.clone(),
        };
        fit_column(self.estimator()?, view, binding)
    }
}

/// Number of earlier values a grain has to keep, checking the offsets
fn history_len(lags: &[usize], horizon: usize) -> Result<usize> {
    if lags.is_empty() {
        return Err(Error::InvalidArgument("at least one lag is required".into()));
    }
    if lags.contains(&0) {
        return Err(Error::InvalidArgument("lags must be at least 1".into()));
    }
    if horizon == 0 {
        return Err(Error::InvalidArgument("horizon must be at least 1".into()));
    }
    let max_lag = lags.iter().copied().max().unwrap_or(1);
    lags.len()
        .checked_mul(horizon)
        .and_then(|_| max_lag.checked_add(horizon - 1))
        .ok_or_else(|| Error::InvalidArgument("lags and horizon are too large".into()))
}

/// Finalized lag computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagTransformer {
    lags: Vec<usize>,
    horizon: usize,
    history: BTreeMap<Vec<String>, VecDeque<f64>>,
}

impl Transformer for LagTransformer {
    const KIND: &'static str = "lag";

    type Value = f64;
    type Output = Vec<f64>;

    fn output_type(&self) -> DataType {
        DataType::f64_tensor(vec![self.lags.len(), self.horizon])
    }

    fn transform(&mut self, input: &Input<f64>) -> Result<Vec<f64>> {
        let capacity = history_len(&self.lags, self.horizon)?;
        let history = self.history.entry(input.grains.clone()).or_default();

        let mut out = Vec::with_capacity(self.lags.len() * self.horizon);
        for &lag in &self.lags {
            for slice in 0..self.horizon {
                // 1-based distance back, at most `capacity`
                let back = lag + (self.horizon - slice - 1);
                out.push(history.get(back - 1).copied().unwrap_or(f64::NAN));
            }
        }

        history.push_front(input.value);
        history.truncate(capacity);
        Ok(out)
    }

    fn validate(&self) -> Result<()> {
        history_len(&self.lags, self.horizon).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featurize_core::Estimator;

    fn transformer(options: &LagOptions) -> LagTransformer {
        options.estimator().unwrap().create_transformer().unwrap()
    }

    fn feed(t: &mut LagTransformer, values: &[f64]) -> Vec<Vec<f64>> {
        values
            .iter()
            .map(|&v| t.transform(&Input::ungrouped(v)).unwrap())
            .collect()
    }

    fn render(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| (!v.is_nan()).then_some(*v)).collect()
    }

    #[test]
    fn test_single_lag() {
        let mut t = transformer(&LagOptions::new("x", "y", vec![1]));
        let out = feed(&mut t, &[1.0, 2.0, 3.0]);
        assert_eq!(render(&out[0]), vec![None]);
        assert_eq!(render(&out[1]), vec![Some(1.0)]);
        assert_eq!(render(&out[2]), vec![Some(2.0)]);
    }

    #[test]
    fn test_multiple_lags_and_horizon() {
        let options = LagOptions {
            horizon: 2,
            ..LagOptions::new("x", "y", vec![1, 3])
        };
        let mut t = transformer(&options);
        assert_eq!(t.output_type(), DataType::f64_tensor(vec![2, 2]));

        let out = feed(&mut t, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        // lag 1: 2 back, 1 back; lag 3: 4 back, 3 back
        assert_eq!(
            render(&out[4]),
            vec![Some(3.0), Some(4.0), Some(1.0), Some(2.0)]
        );
        assert_eq!(render(&out[2]), vec![Some(1.0), Some(2.0), None, None]);
    }

    #[test]
    fn test_grains_are_independent() {
        let mut t = transformer(&LagOptions::new("x", "y", vec![1]));
        let a = |v| Input::new(vec!["a".to_string()], v);
        let b = |v| Input::new(vec!["b".to_string()], v);

        t.transform(&a(1.0)).unwrap();
        assert!(t.transform(&b(5.0)).unwrap()[0].is_nan());
        assert_eq!(t.transform(&a(2.0)).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_load_rejects_invalid_state() {
        let zero_lag = LagTransformer {
            lags: vec![0],
            horizon: 1,
            history: BTreeMap::new(),
        };
        let bytes = featurize_core::state::save_transformer(&zero_lag).unwrap();
        assert!(matches!(
            featurize_core::state::load_transformer::<LagTransformer>(&bytes),
            Err(Error::InvalidState(msg)) if msg.contains("lags must be at least 1")
        ));

        let overflowing = LagTransformer {
            lags: vec![usize::MAX],
            horizon: 2,
            history: BTreeMap::new(),
        };
        let bytes = featurize_core::state::save_transformer(&overflowing).unwrap();
        assert!(featurize_core::state::load_transformer::<LagTransformer>(&bytes).is_err());
    }

    #[test]
    fn test_transform_rejects_invalid_state() {
        let mut t = LagTransformer {
            lags: vec![0],
            horizon: 1,
            history: BTreeMap::new(),
        };
        assert!(matches!(
            t.transform(&Input::ungrouped(1.0)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(LagOptions::new("x", "y", vec![1, 2]).validate().is_ok());
        assert!(LagOptions::new("x", "y", vec![]).validate().is_err());
        assert!(LagOptions::new("x", "y", vec![0]).validate().is_err());
        assert!(LagOptions::new("", "y", vec![1]).validate().is_err());
        assert!(LagOptions {
            horizon: usize::MAX,
            ..LagOptions::new("x", "y", vec![2])
        }
        .validate()
        .is_err());
    }
}
