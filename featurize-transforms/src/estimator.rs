//! Estimator for computations whose finalized form is known up front

use featurize_core::error::{Error, Result};
use featurize_core::transform::{Estimator, FitResult, Input, TrainingState, Transformer};
use tracing::trace;

/// Estimator that reads the data exactly once and then hands over a
/// prepared computation.
///
/// Used by featurizers whose transform-time state (window histories, lag
/// buffers) is built while transforming rather than while training.
#[derive(Debug)]
pub struct OnePassEstimator<T> {
    pending: Option<T>,
    state: TrainingState,
    rows: u64,
}

impl<T: Transformer> OnePassEstimator<T> {
    /// Wrap the computation handed over once training completes
    pub fn new(transformer: T) -> Self {
        Self {
            pending: Some(transformer),
            state: TrainingState::Training,
            rows: 0,
        }
    }

    /// Rows submitted so far
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl<T: Transformer> Estimator for OnePassEstimator<T> {
    type Transformer = T;

    fn training_state(&self) -> Result<TrainingState> {
        Ok(self.state)
    }

    fn fit(&mut self, _input: &Input<T::Value>) -> Result<FitResult> {
        if self.state == TrainingState::Finished {
            return Err(Error::InvalidOperation(format!(
                "{} received a row after training finished",
                T::KIND
            )));
        }
        self.rows += 1;
        Ok(FitResult::Continue)
    }

    fn on_data_completed(&mut self) -> Result<()> {
        trace!(kind = T::KIND, rows = self.rows, "single pass completed");
        self.state = TrainingState::Finished;
        Ok(())
    }

    fn complete_training(&mut self) -> Result<()> {
        self.state = TrainingState::Finished;
        Ok(())
    }

    fn create_transformer(&mut self) -> Result<T> {
        self.pending.take().ok_or_else(|| {
            Error::InvalidOperation(format!("{} transformer was already created", T::KIND))
        })
    }
}
