//! Row-dropping cursor adapter
//!
//! A [`DropView`] forwards every column of its source unchanged but only
//! exposes the rows its filter keeps. Keep decisions may depend on a whole
//! grain, so each cursor first runs a pre-pass over the grain columns and
//! reports every row to the filter before the first row is emitted.

use std::sync::Arc;

use featurize_core::error::{ComputationStep, Error, Result};
use featurize_core::handle::ComputationHandle;
use featurize_core::schema::Schema;
use featurize_core::source::{all_columns, DataView, RowCursor, RowCursorExt};
use featurize_core::state::{load_state, save_state};
use featurize_core::transform::{Input, Transformer};
use featurize_core::value::Value;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fitted::FittedState;

/// A finalized computation deciding, per row, whether the row is kept
pub trait GrainFilter: Transformer<Value = (), Output = bool> {
    /// Report one row of `grains` seen during the pre-pass
    fn observe(&mut self, grains: &[String]);
}

#[derive(Serialize, Deserialize)]
struct SavedDropTransformer {
    grain_columns: Vec<String>,
    state: Vec<u8>,
}

/// A fitted featurizer dropping rows
#[derive(Debug)]
pub struct DropTransformer<F> {
    grain_columns: Vec<String>,
    state: FittedState<F>,
}

impl<F> Clone for DropTransformer<F> {
    fn clone(&self) -> Self {
        Self {
            grain_columns: self.grain_columns.clone(),
            state: self.state.clone(),
        }
    }
}

impl<F: GrainFilter> DropTransformer<F> {
    /// Wrap a finalized filter keyed by `grain_columns`
    pub fn new(grain_columns: Vec<String>, filter: &F) -> Result<Self> {
        Ok(Self {
            grain_columns,
            state: FittedState::capture(filter)?,
        })
    }

    /// Grain columns fed to the filter
    pub fn grain_columns(&self) -> &[String] {
        &self.grain_columns
    }

    /// A fresh, independent instance of the filter
    pub fn filter(&self) -> Result<F> {
        self.state.instantiate()
    }

    /// Apply to `source`. The output schema equals the source schema
    pub fn transform(&self, source: Arc<dyn DataView>) -> Result<DropView<F>> {
        let schema = source.schema();
        let grains = self
            .grain_columns
            .iter()
            .map(|name| schema.string_column(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(DropView {
            source,
            schema,
            grains,
            state: self.state.clone(),
        })
    }

    /// Persist the grain columns and filter state
    pub fn save(&self) -> Result<Vec<u8>> {
        save_state(
            &Self::kind(),
            &SavedDropTransformer {
                grain_columns: self.grain_columns.clone(),
                state: self.state.bytes().to_vec(),
            },
        )
    }

    /// Reload a featurizer persisted with [`DropTransformer::save`]
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let saved: SavedDropTransformer = load_state(&Self::kind(), bytes)?;
        Ok(Self {
            grain_columns: saved.grain_columns,
            state: FittedState::restore(saved.state)?,
        })
    }

    fn kind() -> String {
        format!("drop/{}", F::KIND)
    }
}

/// A view exposing only the rows kept by a [`GrainFilter`]
pub struct DropView<F> {
    source: Arc<dyn DataView>,
    schema: Arc<Schema>,
    grains: Vec<usize>,
    state: FittedState<F>,
}

impl<F: GrainFilter> DataView for DropView<F> {
    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn row_cursor(&self, _active: &[usize]) -> Result<Box<dyn RowCursor + '_>> {
        let base = self.source.row_cursor(&all_columns(&self.schema))?;
        Ok(Box::new(DropCursor {
            view: self,
            base,
            filter: self.state.open()?,
            observed: false,
            position: -1,
        }))
    }

    // Cardinality is data dependent, so the row count stays unknown.
}

struct DropCursor<'a, F> {
    view: &'a DropView<F>,
    base: Box<dyn RowCursor + 'a>,
    filter: ComputationHandle<F>,
    observed: bool,
    position: i64,
}

impl<F: GrainFilter> DropCursor<'_, F> {
    fn read_grains(cursor: &mut dyn RowCursor, grains: &[usize]) -> Result<Vec<String>> {
        grains
            .iter()
            .map(|&index| cursor.get::<String>(index))
            .collect()
    }

    fn observe_all(&mut self) -> Result<()> {
        let mut cursor = self.view.source.row_cursor(&self.view.grains)?;
        let filter = self.filter.get_mut()?;
        let mut rows = 0_u64;
        while cursor.move_next()? {
            filter.observe(&Self::read_grains(cursor.as_mut(), &self.view.grains)?);
            rows += 1;
        }
        debug!(kind = F::KIND, rows, "drop pre-pass completed");
        self.observed = true;
        Ok(())
    }
}

impl<F: GrainFilter> RowCursor for DropCursor<'_, F> {
    fn schema(&self) -> &Arc<Schema> {
        &self.view.schema
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn move_next(&mut self) -> Result<bool> {
        if self.filter.is_released() {
            return Ok(false);
        }
        if !self.observed {
            self.observe_all()?;
        }

        while self.base.move_next()? {
            let grains = Self::read_grains(self.base.as_mut(), &self.view.grains)?;
            let keep = self
                .filter
                .get_mut()?
                .transform(&Input::new(grains, ()))
                .map_err(|e| Error::computation(ComputationStep::Transform, e))?;
            if keep {
                self.position += 1;
                return Ok(true);
            }
        }

        self.filter.release();
        Ok(false)
    }

    fn value(&mut self, column: usize) -> Result<Value> {
        if self.position < 0 || self.filter.is_released() {
            return Err(Error::InvalidOperation(
                "cursor is not positioned on a row".into(),
            ));
        }
        self.base.value(column)
    }

    fn is_column_active(&self, column: usize) -> bool {
        column < self.view.schema.len()
    }
}
