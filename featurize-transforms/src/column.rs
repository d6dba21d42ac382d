//! Transformed-column adapter
//!
//! [`ColumnTransformer`] is a fitted featurizer that appends one output
//! column computed by a finalized computation. Its views hand out cursors
//! that each reconstruct their own computation instance from the saved
//! state, so any number of cursors can read the same view independently.
//!
//! The output value is computed on the first read of a row. Rows that were
//! never read are still fed to the computation before the cursor moves on,
//! so stateful computations always see every row in order.

use std::sync::Arc;

use featurize_core::error::{ComputationStep, Error, Result};
use featurize_core::handle::ComputationHandle;
use featurize_core::schema::{DataType, Field, Schema};
use featurize_core::source::{DataView, RowCursor};
use featurize_core::state::{load_state, save_state};
use featurize_core::transform::{Estimator, Transformer};
use featurize_core::value::{IntoValue, Value};
use serde::{Deserialize, Serialize};

use crate::fit::{fit, FitBinding, FitReport, ResolvedBinding};
use crate::fitted::FittedState;

/// Columns a transformed-column featurizer reads and writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBinding {
    /// Input column, if the computation takes one
    pub input_column: Option<String>,

    /// Grain columns
    pub grain_columns: Vec<String>,

    /// Name of the appended output column
    pub output_column: String,
}

impl ColumnBinding {
    /// The columns read during training
    pub fn fit_binding(&self) -> FitBinding {
        FitBinding::new(self.input_column.clone(), self.grain_columns.clone())
    }

    /// Fail if `schema` already has a column named like the output
    fn check_output_free(&self, schema: &Schema) -> Result<()> {
        if schema.index_of(&self.output_column).is_ok() {
            return Err(Error::InvalidArgument(format!(
                "output column '{}' already exists in the input",
                self.output_column
            )));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct SavedColumnTransformer {
    binding: ColumnBinding,
    output_type: DataType,
    state: Vec<u8>,
}

/// A fitted featurizer appending one computed column
#[derive(Debug)]
pub struct ColumnTransformer<T> {
    binding: ColumnBinding,
    output_type: DataType,
    state: FittedState<T>,
    report: FitReport,
}

impl<T> Clone for ColumnTransformer<T> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
            output_type: self.output_type.clone(),
            state: self.state.clone(),
            report: self.report,
        }
    }
}

/// Train `estimator` on `view` and wrap the result as a column featurizer
pub fn fit_column<E: Estimator>(
    estimator: E,
    view: &dyn DataView,
    binding: ColumnBinding,
) -> Result<ColumnTransformer<E::Transformer>> {
    binding.check_output_free(&view.schema())?;
    let fitted = fit(estimator, view, &binding.fit_binding())?;
    let mut transformer = ColumnTransformer::new(binding, &fitted.transformer)?;
    transformer.report = fitted.report;
    Ok(transformer)
}

impl<T: Transformer> ColumnTransformer<T> {
    /// Wrap a finalized computation
    pub fn new(binding: ColumnBinding, transformer: &T) -> Result<Self> {
        if binding.output_column.is_empty() {
            return Err(Error::InvalidArgument(
                "output column name must not be empty".into(),
            ));
        }
        Ok(Self {
            binding,
            output_type: transformer.output_type(),
            state: FittedState::capture(transformer)?,
            report: FitReport::default(),
        })
    }

    /// The bound columns
    pub fn binding(&self) -> &ColumnBinding {
        &self.binding
    }

    /// Type of the output column
    pub fn output_type(&self) -> &DataType {
        &self.output_type
    }

    /// Statistics of the fit that produced this featurizer
    pub fn report(&self) -> FitReport {
        self.report
    }

    /// A fresh, independent instance of the finalized computation
    pub fn computation(&self) -> Result<T> {
        self.state.instantiate()
    }

    /// Schema produced when applied to `input`
    pub fn output_schema(&self, input: &Schema) -> Result<Schema> {
        self.binding
            .fit_binding()
            .resolve::<T::Value>(input)?;
        self.binding.check_output_free(input)?;
        Ok(input.with_field(Field::new(
            &self.binding.output_column,
            self.output_type.clone(),
        )))
    }

    /// Apply to `source`, validating every bound column before any row is read
    pub fn transform(&self, source: Arc<dyn DataView>) -> Result<TransformedView<T>> {
        let input_schema = source.schema();
        let resolved = self
            .binding
            .fit_binding()
            .resolve::<T::Value>(&input_schema)?;
        let schema = Arc::new(self.output_schema(&input_schema)?);

        Ok(TransformedView {
            source,
            schema,
            resolved,
            output_type: self.output_type.clone(),
            state: self.state.clone(),
        })
    }

    /// Persist the binding and computation state
    pub fn save(&self) -> Result<Vec<u8>> {
        let saved = SavedColumnTransformer {
            binding: self.binding.clone(),
            output_type: self.output_type.clone(),
            state: self.state.bytes().to_vec(),
        };
        save_state(&Self::kind(), &saved)
    }

    /// Reload a featurizer persisted with [`ColumnTransformer::save`]
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let saved: SavedColumnTransformer = load_state(&Self::kind(), bytes)?;
        Ok(Self {
            binding: saved.binding,
            output_type: saved.output_type,
            state: FittedState::restore(saved.state)?,
            report: FitReport::default(),
        })
    }

    fn kind() -> String {
        format!("column/{}", T::KIND)
    }
}

/// A view appending a computed column to its source
pub struct TransformedView<T> {
    source: Arc<dyn DataView>,
    schema: Arc<Schema>,
    resolved: ResolvedBinding,
    output_type: DataType,
    state: FittedState<T>,
}

impl<T: Transformer> TransformedView<T> {
    fn output_index(&self) -> usize {
        self.schema.len() - 1
    }
}

impl<T: Transformer> DataView for TransformedView<T> {
    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn row_cursor(&self, active: &[usize]) -> Result<Box<dyn RowCursor + '_>> {
        let output = self.output_index();
        let output_active = active.contains(&output);

        let mut base_active: Vec<usize> = active.iter().copied().filter(|&i| i < output).collect();
        if output_active {
            base_active.extend(self.resolved.value);
            base_active.extend(self.resolved.grains.iter().copied());
            base_active.sort_unstable();
            base_active.dedup();
        }

        let base = self.source.row_cursor(&base_active)?;
        let computation = if output_active {
            Some(self.state.open()?)
        } else {
            None
        };

        Ok(Box::new(TransformedCursor {
            base,
            schema: Arc::clone(&self.schema),
            resolved: &self.resolved,
            output_type: &self.output_type,
            output,
            computation,
            current: None,
            exhausted: false,
        }))
    }

    fn row_count(&self) -> Option<u64> {
        self.source.row_count()
    }
}

/// Cursor over a [`TransformedView`]
struct TransformedCursor<'a, T> {
    base: Box<dyn RowCursor + 'a>,
    schema: Arc<Schema>,
    resolved: &'a ResolvedBinding,
    output_type: &'a DataType,
    output: usize,
    computation: Option<ComputationHandle<T>>,
    current: Option<Value>,
    exhausted: bool,
}

impl<T: Transformer> TransformedCursor<'_, T> {
    fn compute(&mut self) -> Result<Value> {
        let Some(handle) = self.computation.as_mut() else {
            return Err(Error::InvalidOperation(format!(
                "column {} is not active on this cursor",
                self.output
            )));
        };

        let input = self.resolved.read::<T::Value>(self.base.as_mut())?;
        let value = handle
            .get_mut()?
            .transform(&input)
            .map_err(|e| Error::computation(ComputationStep::Transform, e))?
            .into_value();

        if !value.matches(self.output_type) {
            return Err(Error::Computation {
                step: ComputationStep::Transform,
                message: format!(
                    "produced {} where {} was declared",
                    value.type_name(),
                    self.output_type
                ),
            });
        }
        Ok(value)
    }
}

impl<T: Transformer> RowCursor for TransformedCursor<'_, T> {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn position(&self) -> i64 {
        self.base.position()
    }

    fn move_next(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        // unread rows still advance the computation's history
        if self.computation.is_some() && self.current.is_none() && self.base.position() >= 0 {
            self.compute()?;
        }
        self.current = None;

        let advanced = self.base.move_next()?;
        if !advanced {
            self.exhausted = true;
            if let Some(handle) = self.computation.as_mut() {
                handle.release();
            }
        }
        Ok(advanced)
    }

    fn value(&mut self, column: usize) -> Result<Value> {
        if column != self.output {
            return self.base.value(column);
        }
        if let Some(value) = &self.current {
            return Ok(value.clone());
        }
        let value = self.compute()?;
        self.current = Some(value.clone());
        Ok(value)
    }

    fn is_column_active(&self, column: usize) -> bool {
        if column == self.output {
            self.computation.is_some()
        } else {
            self.base.is_column_active(column)
        }
    }
}
