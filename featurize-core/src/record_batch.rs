//! Record batch implementation backing in-memory data views

use std::sync::Arc;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::schema::{Field, Schema};
use crate::value::Value;

/// A collection of equal-length columns described by a schema
#[derive(Debug, Clone)]
pub struct RecordBatch {
    /// Schema describing the data
    schema: Arc<Schema>,

    /// Columns in this batch
    columns: Vec<Column>,

    /// Number of rows in this batch
    row_count: usize,
}

impl RecordBatch {
    /// Create a new record batch with the given schema and columns
    pub fn new(schema: Arc<Schema>, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.fields().len() {
            return Err(Error::InvalidArgument(
                "Number of columns does not match schema".into(),
            ));
        }

        // Verify columns match schema
        for (field, column) in schema.fields().iter().zip(&columns) {
            if column.name() != field.name() {
                return Err(Error::InvalidArgument(format!(
                    "Column name mismatch: expected '{}', got '{}'",
                    field.name(),
                    column.name()
                )));
            }

            if column.data_type() != field.data_type() {
                return Err(Error::TypeMismatch(format!(
                    "Column type mismatch for '{}': expected {}, got {}",
                    field.name(),
                    field.data_type(),
                    column.data_type()
                )));
            }
        }

        // Verify all columns have the same length
        let row_count = columns.first().map_or(0, Column::len);
        if columns.iter().any(|column| column.len() != row_count) {
            return Err(Error::InvalidArgument(
                "All columns must have the same length".into(),
            ));
        }

        Ok(Self {
            schema,
            columns,
            row_count,
        })
    }

    /// Create a record batch whose schema is derived from the columns
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let fields = columns
            .iter()
            .map(|column| Field::new(column.name(), column.data_type().clone()))
            .collect();
        Self::new(Arc::new(Schema::new(fields)), columns)
    }

    /// Get the schema of this batch
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Get the number of rows in this batch
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Get the number of columns in this batch
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if this batch is empty
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Get a reference to a column by index
    pub fn column(&self, index: usize) -> Result<&Column> {
        self.columns.get(index).ok_or_else(|| {
            Error::InvalidArgument(format!("column index {} out of bounds", index))
        })
    }

    /// Get a reference to a column by name
    pub fn column_by_name(&self, name: &str) -> Result<&Column> {
        let index = self.schema.index_of(name)?;
        self.column(index)
    }

    /// Get the value at (`row`, `column`)
    pub fn value(&self, row: usize, column: usize) -> Result<&Value> {
        self.column(column)?.get(row).ok_or_else(|| {
            Error::InvalidArgument(format!("row {} out of bounds", row))
        })
    }
}
