//! Row-multiplying pivot cursor adapter
//!
//! Pivoting turns each source row holding `[rows, width]` tensor columns
//! into up to `width` output rows. Output row `k` of a source row carries
//! slice `k` of every pivoted tensor as scalar columns plus a horizon
//! column holding `width - k`. A slice is only emitted when no pivoted
//! column has a NaN anywhere in that slice.

use std::collections::HashSet;
use std::sync::Arc;

use featurize_core::error::{Error, Result};
use featurize_core::schema::{DataType, Field, Schema};
use featurize_core::source::{all_columns, DataView, RowCursor};
use featurize_core::state::{load_state, save_state};
use featurize_core::value::Value;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default name of the synthesized horizon column
pub const DEFAULT_HORIZON_COLUMN: &str = "Horizon";

fn default_horizon_column() -> String {
    DEFAULT_HORIZON_COLUMN.to_string()
}

/// Configuration of the pivot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotOptions {
    /// Tensor columns to pivot
    pub columns: Vec<String>,

    /// Name of the synthesized horizon column
    #[serde(default = "default_horizon_column")]
    pub horizon_column: String,
}

impl PivotOptions {
    /// Pivot `columns` with the default horizon column name
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            horizon_column: default_horizon_column(),
        }
    }

    /// Check the options for configuration errors
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one column to pivot is required".into(),
            ));
        }
        if self.horizon_column.is_empty() {
            return Err(Error::InvalidArgument(
                "horizon column name must not be empty".into(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(Error::InvalidArgument(format!(
                "column '{}' is pivoted more than once",
                dup
            )));
        }
        Ok(())
    }
}

/// Where an output column's values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputColumn {
    /// A source column forwarded unchanged
    Passthrough(usize),
    /// Row `row` of pivoted column `pivot`
    Pivot { pivot: usize, row: usize },
    /// The synthesized horizon
    Horizon,
}

/// A pivoted tensor column resolved against a source schema
#[derive(Debug, Clone, PartialEq, Eq)]
struct PivotColumn {
    source: usize,
    rows: usize,
    element: DataType,
}

/// Schema binding of a pivot, resolved before any row is read
#[derive(Debug, Clone)]
struct PivotLayout {
    schema: Arc<Schema>,
    outputs: Vec<OutputColumn>,
    pivots: Vec<PivotColumn>,
    width: usize,
}

impl PivotLayout {
    fn resolve(options: &PivotOptions, input: &Schema) -> Result<Self> {
        options.validate()?;

        let mut pivots = Vec::with_capacity(options.columns.len());
        let mut width = None;
        for name in &options.columns {
            let source = input.index_of(name)?;
            let data_type = input.field(source).data_type();
            if !data_type.is_tensor() || !data_type.element_type().is_floating() {
                return Err(Error::TypeMismatch(format!(
                    "pivot column '{}' must be a floating point tensor, found {}",
                    name, data_type
                )));
            }

            let shape = data_type.shape();
            let &[rows, cols] = shape else {
                return Err(Error::ShapeMismatch {
                    column: name.clone(),
                    expected: vec![0, 0],
                    actual: shape.to_vec(),
                });
            };
            if rows == 0 || cols == 0 {
                return Err(Error::ShapeMismatch {
                    column: name.clone(),
                    expected: vec![rows.max(1), cols.max(1)],
                    actual: shape.to_vec(),
                });
            }
            match width {
                Some(w) if w != cols => {
                    return Err(Error::ShapeMismatch {
                        column: name.clone(),
                        expected: vec![rows, w],
                        actual: shape.to_vec(),
                    });
                }
                _ => width = Some(cols),
            }

            pivots.push(PivotColumn {
                source,
                rows,
                element: data_type.element_type().clone(),
            });
        }
        let width = width.unwrap_or(1);

        let mut fields = Vec::new();
        let mut outputs = Vec::new();
        for (index, field) in input.fields().iter().enumerate() {
            if pivots.iter().all(|p| p.source != index) {
                fields.push(field.clone());
                outputs.push(OutputColumn::Passthrough(index));
            }
        }
        for (pivot, (name, column)) in options.columns.iter().zip(&pivots).enumerate() {
            for row in 0..column.rows {
                let field_name = if column.rows == 1 {
                    name.clone()
                } else {
                    format!("{}_{}", name, row)
                };
                fields.push(Field::new(&field_name, column.element.clone()));
                outputs.push(OutputColumn::Pivot { pivot, row });
            }
        }
        fields.push(Field::new(&options.horizon_column, DataType::UInt32));
        outputs.push(OutputColumn::Horizon);

        let mut names = HashSet::new();
        if let Some(dup) = fields.iter().find(|f| !names.insert(f.name())) {
            return Err(Error::InvalidArgument(format!(
                "pivot output column '{}' collides with another column",
                dup.name()
            )));
        }

        debug!(
            pivots = pivots.len(),
            width,
            columns = fields.len(),
            "resolved pivot layout"
        );
        Ok(Self {
            schema: Arc::new(Schema::new(fields)),
            outputs,
            pivots,
            width,
        })
    }
}

/// A fitted pivot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTransformer {
    options: PivotOptions,
}

impl PivotTransformer {
    /// Configure a pivot, validating the options eagerly
    pub fn new(options: PivotOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// The configured options
    pub fn options(&self) -> &PivotOptions {
        &self.options
    }

    /// Schema produced when applied to `input`
    pub fn output_schema(&self, input: &Schema) -> Result<Arc<Schema>> {
        Ok(PivotLayout::resolve(&self.options, input)?.schema)
    }

    /// Apply to `source`; malformed pivot columns fail here, before any row
    /// is read
    pub fn transform(&self, source: Arc<dyn DataView>) -> Result<PivotView> {
        let layout = PivotLayout::resolve(&self.options, &source.schema())?;
        Ok(PivotView { source, layout })
    }

    /// Persist the options
    pub fn save(&self) -> Result<Vec<u8>> {
        save_state("pivot", &self.options)
    }

    /// Reload a pivot persisted with [`PivotTransformer::save`]
    pub fn load(bytes: &[u8]) -> Result<Self> {
        Self::new(load_state("pivot", bytes)?)
    }
}

/// A view exposing pivoted rows
pub struct PivotView {
    source: Arc<dyn DataView>,
    layout: PivotLayout,
}

impl DataView for PivotView {
    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.layout.schema)
    }

    fn row_cursor(&self, _active: &[usize]) -> Result<Box<dyn RowCursor + '_>> {
        let base = self.source.row_cursor(&all_columns(&self.source.schema()))?;
        Ok(Box::new(PivotCursor {
            layout: &self.layout,
            base,
            tensors: Vec::new(),
            next_slice: None,
            slice: 0,
            position: -1,
            exhausted: false,
        }))
    }
}

struct PivotCursor<'a> {
    layout: &'a PivotLayout,
    base: Box<dyn RowCursor + 'a>,

    /// Pivoted tensors of the current base row
    tensors: Vec<Value>,

    /// First slice still to be scanned, `None` before the first base row
    next_slice: Option<usize>,

    /// Slice of the current output row
    slice: usize,
    position: i64,
    exhausted: bool,
}

impl PivotCursor<'_> {
    fn element(&self, pivot: usize, row: usize, slice: usize) -> Result<f64> {
        let index = row * self.layout.width + slice;
        self.tensors
            .get(pivot)
            .and_then(|tensor| tensor.tensor_element(index))
            .ok_or_else(|| {
                Error::InvalidOperation(format!(
                    "pivot tensor {} has no element {}",
                    pivot, index
                ))
            })
    }

    fn slice_is_complete(&self, slice: usize) -> Result<bool> {
        for (pivot, column) in self.layout.pivots.iter().enumerate() {
            for row in 0..column.rows {
                if self.element(pivot, row, slice)?.is_nan() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn load_tensors(&mut self) -> Result<()> {
        self.tensors.clear();
        for column in &self.layout.pivots {
            self.tensors.push(self.base.value(column.source)?);
        }
        Ok(())
    }
}

impl RowCursor for PivotCursor<'_> {
    fn schema(&self) -> &Arc<Schema> {
        &self.layout.schema
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn move_next(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        loop {
            let start = match self.next_slice {
                Some(slice) if slice < self.layout.width => slice,
                _ => {
                    if !self.base.move_next()? {
                        self.exhausted = true;
                        self.tensors.clear();
                        return Ok(false);
                    }
                    self.load_tensors()?;
                    0
                }
            };

            self.next_slice = Some(self.layout.width);
            for slice in start..self.layout.width {
                if self.slice_is_complete(slice)? {
                    self.slice = slice;
                    self.next_slice = Some(slice + 1);
                    self.position += 1;
                    return Ok(true);
                }
            }
        }
    }

    fn value(&mut self, column: usize) -> Result<Value> {
        if self.position < 0 || self.exhausted {
            return Err(Error::InvalidOperation(
                "cursor is not positioned on a row".into(),
            ));
        }
        let output = self.layout.outputs.get(column).copied().ok_or_else(|| {
            Error::InvalidArgument(format!("column index {} out of bounds", column))
        })?;

        match output {
            OutputColumn::Passthrough(source) => self.base.value(source),
            OutputColumn::Pivot { pivot, row } => {
                let value = self.element(pivot, row, self.slice)?;
                #[allow(clippy::cast_possible_truncation)]
                let value = match self.layout.pivots[pivot].element {
                    DataType::Float32 => Value::Float32(value as f32),
                    _ => Value::Float64(value),
                };
                Ok(value)
            }
            OutputColumn::Horizon => {
                let horizon = u32::try_from(self.layout.width - self.slice).map_err(|_| {
                    Error::InvalidOperation("horizon does not fit in u32".into())
                })?;
                Ok(Value::UInt32(horizon))
            }
        }
    }

    fn is_column_active(&self, column: usize) -> bool {
        column < self.layout.outputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featurize_core::{Column, InMemoryDataView};

    fn schema(fields: Vec<(&str, DataType)>) -> Schema {
        Schema::new(fields.into_iter().map(|(n, t)| Field::new(n, t)).collect())
    }

    fn names(schema: &Schema) -> Vec<&str> {
        schema.fields().iter().map(Field::name).collect()
    }

    #[test]
    fn test_output_schema_single_row() {
        let input = schema(vec![
            ("ColA", DataType::Float64),
            ("RW", DataType::f64_tensor(vec![1, 2])),
        ]);
        let pivot = PivotTransformer::new(PivotOptions::new(vec!["RW".into()])).unwrap();
        let out = pivot.output_schema(&input).unwrap();

        assert_eq!(names(&out), vec!["ColA", "RW", "Horizon"]);
        assert_eq!(out.field(1).data_type(), &DataType::Float64);
        assert_eq!(out.field(2).data_type(), &DataType::UInt32);
    }

    #[test]
    fn test_output_schema_multi_row() {
        let input = schema(vec![
            ("Lags", DataType::f32_tensor(vec![2, 3])),
            ("Key", DataType::String),
        ]);
        let options = PivotOptions {
            columns: vec!["Lags".into()],
            horizon_column: "H".into(),
        };
        let out = PivotTransformer::new(options)
            .unwrap()
            .output_schema(&input)
            .unwrap();

        assert_eq!(names(&out), vec!["Key", "Lags_0", "Lags_1", "H"]);
        assert_eq!(out.field(1).data_type(), &DataType::Float32);
    }

    #[test]
    fn test_rejects_bad_columns() {
        let input = schema(vec![
            ("Scalar", DataType::Float64),
            ("Ints", DataType::Tensor(Box::new(DataType::Int32), vec![1, 2])),
            ("Flat", DataType::f64_tensor(vec![3])),
            ("Wide", DataType::f64_tensor(vec![1, 3])),
            ("Narrow", DataType::f64_tensor(vec![1, 2])),
        ]);
        let resolve = |cols: &[&str]| {
            let options = PivotOptions::new(cols.iter().map(|c| c.to_string()).collect());
            PivotLayout::resolve(&options, &input)
        };

        assert!(matches!(resolve(&["Missing"]), Err(Error::ColumnNotFound(_))));
        assert!(matches!(resolve(&["Scalar"]), Err(Error::TypeMismatch(_))));
        assert!(matches!(resolve(&["Ints"]), Err(Error::TypeMismatch(_))));
        assert!(matches!(resolve(&["Flat"]), Err(Error::ShapeMismatch { .. })));
        assert!(matches!(
            resolve(&["Wide", "Narrow"]),
            Err(Error::ShapeMismatch { column, .. }) if column == "Narrow"
        ));
        assert!(matches!(resolve(&["Wide", "Wide"]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_name_collision() {
        let input = schema(vec![
            ("Horizon", DataType::Float64),
            ("RW", DataType::f64_tensor(vec![1, 1])),
        ]);
        let pivot = PivotTransformer::new(PivotOptions::new(vec!["RW".into()])).unwrap();
        assert!(matches!(
            pivot.output_schema(&input),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_all_nan_rows_are_skipped() {
        let nan = f64::NAN;
        let view = InMemoryDataView::from_columns(vec![Column::f64_tensors(
            "RW",
            vec![1, 2],
            vec![vec![nan, nan], vec![nan, nan], vec![nan, 5.0]],
        )
        .unwrap()])
        .unwrap();
        let pivot = PivotTransformer::new(PivotOptions::new(vec!["RW".into()])).unwrap();
        let pivoted = pivot.transform(Arc::new(view)).unwrap();

        let mut cursor = pivoted.row_cursor(&[0, 1]).unwrap();
        assert!(matches!(cursor.value(0), Err(Error::InvalidOperation(_))));
        assert!(cursor.move_next().unwrap());
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.value(0).unwrap(), Value::Float64(5.0));
        assert_eq!(cursor.value(1).unwrap(), Value::UInt32(1));
        assert!(!cursor.move_next().unwrap());
        assert!(!cursor.move_next().unwrap());
        assert_eq!(pivoted.row_count(), None);
    }

    #[test]
    fn test_options_round_trip() {
        let pivot = PivotTransformer::new(PivotOptions::new(vec!["RW".into()])).unwrap();
        let loaded = PivotTransformer::load(&pivot.save().unwrap()).unwrap();
        assert_eq!(loaded, pivot);
    }
}
