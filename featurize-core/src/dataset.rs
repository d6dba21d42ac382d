//! In-memory data view backed by a record batch

use std::sync::Arc;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;
use crate::schema::Schema;
use crate::source::{DataView, RowCursor};
use crate::value::Value;

/// An in-memory, restartable data view
#[derive(Debug, Clone)]
pub struct InMemoryDataView {
    /// The rows of this view
    batch: Arc<RecordBatch>,
}

impl InMemoryDataView {
    /// Create a new view over a record batch
    pub fn new(batch: RecordBatch) -> Self {
        Self {
            batch: Arc::new(batch),
        }
    }

    /// Create a new view from columns, deriving the schema
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        Ok(Self::new(RecordBatch::from_columns(columns)?))
    }

    /// Get the batch backing this view
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }
}

impl DataView for InMemoryDataView {
    fn schema(&self) -> Arc<Schema> {
        self.batch.schema().clone()
    }

    fn row_cursor(&self, active: &[usize]) -> Result<Box<dyn RowCursor + '_>> {
        Ok(Box::new(InMemoryCursor::new(&self.batch, active)?))
    }

    fn row_count(&self) -> Option<u64> {
        Some(self.batch.row_count() as u64)
    }
}

/// A cursor over an in-memory batch
pub struct InMemoryCursor<'a> {
    /// The batch being scanned
    batch: &'a RecordBatch,

    /// Active flag per column
    active: Vec<bool>,

    /// Current row, -1 before the first row
    position: i64,
}

impl<'a> InMemoryCursor<'a> {
    /// Create a cursor positioned before the first row
    pub fn new(batch: &'a RecordBatch, active: &[usize]) -> Result<Self> {
        let mut flags = vec![false; batch.column_count()];
        for &index in active {
            let flag = flags.get_mut(index).ok_or_else(|| {
                Error::InvalidArgument(format!("column index {} out of bounds", index))
            })?;
            *flag = true;
        }

        Ok(Self {
            batch,
            active: flags,
            position: -1,
        })
    }

    fn current_row(&self) -> Result<usize> {
        usize::try_from(self.position)
            .ok()
            .filter(|&row| row < self.batch.row_count())
            .ok_or_else(|| Error::InvalidOperation("cursor is not positioned on a row".into()))
    }
}

impl RowCursor for InMemoryCursor<'_> {
    fn schema(&self) -> &Arc<Schema> {
        self.batch.schema()
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn move_next(&mut self) -> Result<bool> {
        let row_count = i64::try_from(self.batch.row_count())
            .map_err(|_| Error::InvalidOperation("row count exceeds i64".into()))?;
        if self.position < row_count {
            self.position += 1;
        }
        Ok(self.position < row_count)
    }

    fn value(&mut self, column: usize) -> Result<Value> {
        if !self.is_column_active(column) {
            return Err(Error::InvalidOperation(format!(
                "column {} is not active on this cursor",
                column
            )));
        }
        let row = self.current_row()?;
        self.batch.value(row, column).cloned()
    }

    fn is_column_active(&self, column: usize) -> bool {
        self.active.get(column).copied().unwrap_or(false)
    }
}
