//! Fit engine driving the incremental-training state machine
//!
//! The engine owns the estimator for the duration of training and feeds it
//! rows from a restartable [`DataView`]. The value column and every grain
//! column are read through their own resettable cursors, which are always
//! positioned on the same logical row and restarted together.
//!
//! Termination is entirely up to the estimator: the engine keeps restarting
//! passes for as long as [`TrainingState::Training`] is reported.

use featurize_core::error::{ComputationStep, Error, Result};
use featurize_core::schema::Schema;
use featurize_core::source::{DataView, RowCursor, RowCursorExt};
use featurize_core::transform::{Estimator, FitResult, Input, InputOf, TrainingState};
use featurize_core::value::FromValue;
use tracing::{debug, trace};

/// Columns an estimator is trained on
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FitBinding {
    /// Column feeding the estimator's value, if it takes one
    pub value_column: Option<String>,

    /// Grain columns, in the order their values are submitted
    pub grain_columns: Vec<String>,
}

impl FitBinding {
    /// Bind a value column and grain columns
    pub fn new(value_column: Option<String>, grain_columns: Vec<String>) -> Self {
        Self {
            value_column,
            grain_columns,
        }
    }

    /// Resolve column indices against `schema`, checking types eagerly
    pub fn resolve<T: FromValue>(&self, schema: &Schema) -> Result<ResolvedBinding> {
        let value = match &self.value_column {
            Some(name) => {
                let index = schema.index_of(name)?;
                let data_type = schema.field(index).data_type();
                if !T::accepts(data_type) {
                    return Err(Error::TypeMismatch(format!(
                        "column '{}' of type {} is not a supported input",
                        name, data_type
                    )));
                }
                Some(index)
            }
            None => {
                T::unbound()?;
                None
            }
        };

        let grains = self
            .grain_columns
            .iter()
            .map(|name| schema.string_column(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolvedBinding { value, grains })
    }
}

/// Column indices of a [`FitBinding`] resolved against a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding {
    /// Value column index
    pub value: Option<usize>,

    /// Grain column indices
    pub grains: Vec<usize>,
}

impl ResolvedBinding {
    /// Read the current row of `cursor` as a computation input
    pub fn read<T: FromValue>(&self, cursor: &mut dyn RowCursor) -> Result<Input<T>> {
        let grains = self
            .grains
            .iter()
            .map(|&index| cursor.get::<String>(index))
            .collect::<Result<Vec<_>>>()?;
        let value = match self.value {
            Some(index) => T::from_value(cursor.value(index)?)?,
            None => T::unbound()?,
        };
        Ok(Input::new(grains, value))
    }
}

/// Statistics of a completed fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FitReport {
    /// Rows submitted across all passes
    pub rows_submitted: u64,

    /// Passes started, including the first
    pub passes: u64,

    /// Restarts requested through [`FitResult::ResetAndContinue`]
    pub resets: u64,
}

/// A trained computation together with its fit statistics
#[derive(Debug)]
pub struct Fitted<T> {
    /// The finalized computation
    pub transformer: T,

    /// Statistics of the fit
    pub report: FitReport,
}

/// A cursor over one set of columns that can be restarted from row zero
struct ResettableCursor<'a> {
    view: &'a dyn DataView,
    active: Vec<usize>,
    cursor: Box<dyn RowCursor + 'a>,
}

impl<'a> ResettableCursor<'a> {
    /// Open a cursor positioned before the first row
    fn open(view: &'a dyn DataView, active: Vec<usize>) -> Result<Self> {
        let cursor = view.row_cursor(&active)?;
        Ok(Self {
            view,
            active,
            cursor,
        })
    }

    /// Restart before row zero
    fn reset(&mut self) -> Result<()> {
        self.cursor = self.view.row_cursor(&self.active)?;
        Ok(())
    }

    fn move_next(&mut self) -> Result<bool> {
        self.cursor.move_next()
    }
}

/// The value cursor plus one independent cursor per grain column
struct RowFeed<'a> {
    binding: &'a ResolvedBinding,
    values: ResettableCursor<'a>,
    grains: Vec<ResettableCursor<'a>>,
}

impl<'a> RowFeed<'a> {
    fn open(view: &'a dyn DataView, binding: &'a ResolvedBinding) -> Result<Self> {
        let values = ResettableCursor::open(view, binding.value.into_iter().collect())?;
        let grains = binding
            .grains
            .iter()
            .map(|&index| ResettableCursor::open(view, vec![index]))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            binding,
            values,
            grains,
        })
    }

    fn reset(&mut self) -> Result<()> {
        self.values.reset()?;
        for grain in &mut self.grains {
            grain.reset()?;
        }
        Ok(())
    }

    /// Advance every cursor one row; they must agree on exhaustion
    fn move_next(&mut self) -> Result<bool> {
        let advanced = self.values.move_next()?;
        for grain in &mut self.grains {
            if grain.move_next()? != advanced {
                return Err(Error::InvalidOperation(
                    "grain cursor fell out of step with the value cursor".into(),
                ));
            }
        }
        Ok(advanced)
    }

    fn read<T: FromValue>(&mut self) -> Result<Input<T>> {
        let grains = self
            .grains
            .iter_mut()
            .zip(&self.binding.grains)
            .map(|(grain, &index)| grain.cursor.get::<String>(index))
            .collect::<Result<Vec<_>>>()?;
        let value = match self.binding.value {
            Some(index) => T::from_value(self.values.cursor.value(index)?)?,
            None => T::unbound()?,
        };
        Ok(Input::new(grains, value))
    }
}

fn training_state<E: Estimator>(estimator: &E) -> Result<TrainingState> {
    estimator
        .training_state()
        .map_err(|e| Error::computation(ComputationStep::TrainingState, e))
}

/// Train `estimator` on `view` to completion and return the finalized
/// computation.
///
/// Any failure reported by the estimator aborts the fit with an
/// [`Error::Computation`] naming the failing step; nothing is retried and
/// no transformer is produced.
pub fn fit<E: Estimator>(
    mut estimator: E,
    view: &dyn DataView,
    binding: &FitBinding,
) -> Result<Fitted<E::Transformer>> {
    let schema = view.schema();
    let resolved = binding.resolve::<InputOf<E>>(&schema)?;
    let mut feed = RowFeed::open(view, &resolved)?;
    let mut report = FitReport {
        passes: 1,
        ..FitReport::default()
    };

    if feed.move_next()? {
        loop {
            if training_state(&estimator)? == TrainingState::Finished {
                break;
            }

            let input = feed.read::<InputOf<E>>()?;
            let result = estimator
                .fit(&input)
                .map_err(|e| Error::computation(ComputationStep::Fit, e))?;
            report.rows_submitted += 1;

            if result == FitResult::ResetAndContinue {
                trace!(rows = report.rows_submitted, "estimator requested a reset");
                report.resets += 1;
                report.passes += 1;
                feed.reset()?;
            }

            if !feed.move_next()? {
                estimator
                    .on_data_completed()
                    .map_err(|e| Error::computation(ComputationStep::OnDataCompleted, e))?;
                if training_state(&estimator)? == TrainingState::Finished {
                    break;
                }

                report.passes += 1;
                trace!(pass = report.passes, "starting another pass");
                feed.reset()?;
                if !feed.move_next()? {
                    return Err(Error::InvalidOperation(
                        "row source produced no rows after restart".into(),
                    ));
                }
            }
        }
    } else {
        debug!("row source is empty");
        if training_state(&estimator)? == TrainingState::Training {
            estimator
                .on_data_completed()
                .map_err(|e| Error::computation(ComputationStep::OnDataCompleted, e))?;
        }
    }

    estimator
        .complete_training()
        .map_err(|e| Error::computation(ComputationStep::CompleteTraining, e))?;
    let transformer = estimator
        .create_transformer()
        .map_err(|e| Error::computation(ComputationStep::CreateTransformer, e))?;

    debug!(
        rows = report.rows_submitted,
        passes = report.passes,
        resets = report.resets,
        "fit completed"
    );
    Ok(Fitted {
        transformer,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use featurize_core::schema::{DataType, Field};

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("store", DataType::String),
            Field::new("sales", DataType::Float32),
            Field::new("label", DataType::Boolean),
        ])
    }

    #[test]
    fn test_resolve_binding() {
        let binding = FitBinding::new(Some("sales".into()), vec!["store".into()]);
        let resolved = binding.resolve::<f64>(&schema()).unwrap();
        assert_eq!(resolved.value, Some(1));
        assert_eq!(resolved.grains, vec![0]);
    }

    #[test]
    fn test_resolve_rejects_unsupported_value_type() {
        let binding = FitBinding::new(Some("label".into()), vec![]);
        assert!(matches!(
            binding.resolve::<f64>(&schema()),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_numeric_grain() {
        let binding = FitBinding::new(Some("sales".into()), vec!["sales".into()]);
        assert!(matches!(
            binding.resolve::<f64>(&schema()),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_resolve_requires_value_column() {
        let binding = FitBinding::new(None, vec!["store".into()]);
        assert!(matches!(
            binding.resolve::<f64>(&schema()),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(binding.resolve::<()>(&schema()).unwrap().value, None);
    }
}
