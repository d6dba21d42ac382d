//! Row cursor and data view traits for pull-based data input
//!
//! A [`DataView`] is a restartable row source: every call to
//! [`DataView::row_cursor`] yields a fresh forward-only cursor positioned
//! before row zero. Restarting a pass therefore means dropping the current
//! cursor and asking the view for a new one.

use std::sync::Arc;

use crate::error::Result;
use crate::schema::Schema;
use crate::value::{FromValue, Value};

/// A forward-only, single-pass cursor over the rows of a data view
pub trait RowCursor {
    /// Schema of the rows produced by this cursor
    fn schema(&self) -> &Arc<Schema>;

    /// Dense logical index of the current row, `-1` before the first
    /// `move_next`
    fn position(&self) -> i64;

    /// Advance to the next row. Returns `false` once the cursor is exhausted
    fn move_next(&mut self) -> Result<bool>;

    /// Read `column` of the current row
    fn value(&mut self, column: usize) -> Result<Value>;

    /// Whether `column` was requested when the cursor was created
    fn is_column_active(&self, column: usize) -> bool;
}

/// Typed access on top of [`RowCursor::value`]
pub trait RowCursorExt: RowCursor {
    /// Read `column` of the current row as `T`
    fn get<T: FromValue>(&mut self, column: usize) -> Result<T> {
        T::from_value(self.value(column)?)
    }
}

impl<C: RowCursor + ?Sized> RowCursorExt for C {}

/// A restartable source of rows
pub trait DataView: Send + Sync {
    /// Get the schema of this view
    fn schema(&self) -> Arc<Schema>;

    /// Create a cursor positioned before the first row. Only the `active`
    /// columns are guaranteed to be readable
    fn row_cursor(&self, active: &[usize]) -> Result<Box<dyn RowCursor + '_>>;

    /// Create up to `n` cursors that together cover every row once
    fn row_cursor_set(&self, active: &[usize], _n: usize) -> Result<Vec<Box<dyn RowCursor + '_>>> {
        Ok(vec![self.row_cursor(active)?])
    }

    /// Total number of rows, if known without iterating
    fn row_count(&self) -> Option<u64> {
        None
    }
}

/// Indices of every column of `schema`
pub fn all_columns(schema: &Schema) -> Vec<usize> {
    (0..schema.len()).collect()
}

/// Read every value of the column `name` from a fresh cursor over `view`
pub fn collect_column<T: FromValue>(view: &dyn DataView, name: &str) -> Result<Vec<T>> {
    let schema = view.schema();
    let index = schema.index_of(name)?;
    let mut cursor = view.row_cursor(&[index])?;

    let mut values = Vec::new();
    while cursor.move_next()? {
        values.push(cursor.get::<T>(index)?);
    }
    Ok(values)
}
