//! Short grain dropper
//!
//! Removes every row of a grain that has fewer than `min_points` rows in
//! the data being transformed, as counted by the cursor's pre-pass. A grain
//! that was already short during training stays dropped even when the
//! transformed data has enough rows for it.

use std::collections::BTreeMap;

use featurize_core::error::{Error, Result};
use featurize_core::schema::DataType;
use featurize_core::source::DataView;
use featurize_core::transform::{Estimator, FitResult, Input, TrainingState, Transformer};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::drop::{DropTransformer, GrainFilter};
use crate::fit::{fit, FitBinding};

/// Configuration of the short grain dropper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortDropOptions {
    /// Columns identifying a grain
    pub grain_columns: Vec<String>,

    /// Minimum number of rows a grain needs to be kept
    pub min_points: u64,
}

impl Default for ShortDropOptions {
    fn default() -> Self {
        Self {
            grain_columns: Vec::new(),
            min_points: 1,
        }
    }
}

impl ShortDropOptions {
    /// Drop grains keyed by `grain_columns` with fewer than `min_points` rows
    pub fn new(grain_columns: Vec<String>, min_points: u64) -> Self {
        Self {
            grain_columns,
            min_points,
        }
    }

    /// Check the options for configuration errors
    pub fn validate(&self) -> Result<()> {
        if self.grain_columns.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one grain column is required".into(),
            ));
        }
        if self.min_points == 0 {
            return Err(Error::InvalidArgument("min points must be at least 1".into()));
        }
        Ok(())
    }

    /// The estimator training this featurizer
    pub fn estimator(&self) -> Result<ShortDropEstimator> {
        self.validate()?;
        Ok(ShortDropEstimator {
            min_points: self.min_points,
            counts: BTreeMap::new(),
            state: TrainingState::Training,
        })
    }

    /// Fit on `view`
    pub fn fit(&self, view: &dyn DataView) -> Result<DropTransformer<ShortDropTransformer>> {
        let binding = FitBinding::new(None, self.grain_columns.clone());
        let fitted = fit(self.estimator()?, view, &binding)?;
        DropTransformer::new(self.grain_columns.clone(), &fitted.transformer)
    }
}

/// Counts rows per grain in a single pass
#[derive(Debug)]
pub struct ShortDropEstimator {
    min_points: u64,
    counts: BTreeMap<Vec<String>, u64>,
    state: TrainingState,
}

impl Estimator for ShortDropEstimator {
    type Transformer = ShortDropTransformer;

    fn training_state(&self) -> Result<TrainingState> {
        Ok(self.state)
    }

    fn fit(&mut self, input: &Input<()>) -> Result<FitResult> {
        *self.counts.entry(input.grains.clone()).or_default() += 1;
        Ok(FitResult::Continue)
    }

    fn on_data_completed(&mut self) -> Result<()> {
        self.state = TrainingState::Finished;
        Ok(())
    }

    fn complete_training(&mut self) -> Result<()> {
        let short = self
            .counts
            .values()
            .filter(|&&count| count < self.min_points)
            .count();
        debug!(
            grains = self.counts.len(),
            short,
            min_points = self.min_points,
            "counted training grains"
        );
        Ok(())
    }

    fn create_transformer(&mut self) -> Result<ShortDropTransformer> {
        Ok(ShortDropTransformer {
            min_points: self.min_points,
            trained: std::mem::take(&mut self.counts),
            observed: BTreeMap::new(),
        })
    }
}

/// Finalized short grain filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortDropTransformer {
    min_points: u64,
    trained: BTreeMap<Vec<String>, u64>,

    /// Pre-pass counts; transient, rebuilt by every cursor
    #[serde(skip)]
    observed: BTreeMap<Vec<String>, u64>,
}

impl ShortDropTransformer {
    /// Whether rows of `grains` are kept, given the pre-pass counts so far
    pub fn keeps(&self, grains: &[String]) -> bool {
        let observed = self.observed.get(grains).copied().unwrap_or(0);
        let trained_long = self
            .trained
            .get(grains)
            .map_or(true, |&count| count >= self.min_points);
        trained_long && observed >= self.min_points
    }
}

impl Transformer for ShortDropTransformer {
    const KIND: &'static str = "short_drop";

    type Value = ();
    type Output = bool;

    fn output_type(&self) -> DataType {
        DataType::Boolean
    }

    fn transform(&mut self, input: &Input<()>) -> Result<bool> {
        Ok(self.keeps(&input.grains))
    }
}

impl GrainFilter for ShortDropTransformer {
    fn observe(&mut self, grains: &[String]) {
        *self.observed.entry(grains.to_vec()).or_default() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grain(key: &str) -> Vec<String> {
        vec![key.to_string()]
    }

    fn trained(rows: &[&str], min_points: u64) -> ShortDropTransformer {
        let mut estimator = ShortDropOptions::new(grain("g"), min_points)
            .estimator()
            .unwrap();
        for key in rows {
            estimator.fit(&Input::new(grain(key), ())).unwrap();
        }
        estimator.on_data_completed().unwrap();
        estimator.complete_training().unwrap();
        estimator.create_transformer().unwrap()
    }

    fn observe(t: &mut ShortDropTransformer, rows: &[&str]) {
        for key in rows {
            t.observe(&grain(key));
        }
    }

    #[test]
    fn test_prepass_counts_decide() {
        let mut t = trained(&["a", "a", "a", "b"], 2);
        observe(&mut t, &["a", "a", "b"]);
        assert!(t.keeps(&grain("a")));
        assert!(!t.keeps(&grain("b")));
    }

    #[test]
    fn test_trained_long_grain_short_at_transform_is_dropped() {
        let mut t = trained(&["a", "a", "a"], 2);
        observe(&mut t, &["a"]);
        assert!(!t.keeps(&grain("a")));
        observe(&mut t, &["a"]);
        assert!(t.keeps(&grain("a")));
    }

    #[test]
    fn test_unseen_grain_uses_prepass() {
        let mut t = trained(&["a", "a"], 2);
        assert!(!t.keeps(&grain("c")));
        t.observe(&grain("c"));
        assert!(!t.keeps(&grain("c")));
        t.observe(&grain("c"));
        assert!(t.keeps(&grain("c")));
    }

    #[test]
    fn test_prepass_does_not_rescue_trained_short_grain() {
        let mut t = trained(&["a", "b"], 2);
        observe(&mut t, &["b"; 5]);
        assert!(!t.keeps(&grain("b")));
    }

    #[test]
    fn test_observed_counts_are_not_persisted() {
        let mut t = trained(&["a"], 1);
        observe(&mut t, &["a", "z"]);
        assert!(t.keeps(&grain("z")));
        let restored = featurize_core::state::clone_transformer(&t).unwrap();
        assert!(!restored.keeps(&grain("a")));
        assert!(!restored.keeps(&grain("z")));
    }

    #[test]
    fn test_validate() {
        assert!(ShortDropOptions::new(vec![], 2).validate().is_err());
        assert!(ShortDropOptions::new(grain("g"), 0).validate().is_err());
        assert!(ShortDropOptions::new(grain("g"), 3).validate().is_ok());
    }
}
