//! Column implementation for storing typed values in memory

use crate::error::{Error, Result};
use crate::schema::DataType;
use crate::value::{IntoValue, Value};

/// A column of data with a specific type
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Name of the column
    name: String,

    /// Data type of the column
    data_type: DataType,

    /// One value per row
    values: Vec<Value>,
}

impl Column {
    /// Create a new column, checking every value against `data_type`
    pub fn new(name: &str, data_type: DataType, values: Vec<Value>) -> Result<Self> {
        if let Some((row, bad)) = values
            .iter()
            .enumerate()
            .find(|(_, value)| !value.matches(&data_type))
        {
            return Err(Error::TypeMismatch(format!(
                "column '{}' row {}: {} is not a valid {}",
                name,
                row,
                bad.type_name(),
                data_type
            )));
        }

        Ok(Self {
            name: name.to_string(),
            data_type,
            values,
        })
    }

    /// Create a column from a vector of values
    pub fn from_vec<T: IntoValue>(name: &str, data_type: DataType, values: Vec<T>) -> Result<Self> {
        Self::new(
            name,
            data_type,
            values.into_iter().map(IntoValue::into_value).collect(),
        )
    }

    /// Create a `String` column
    pub fn strings(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            data_type: DataType::String,
            values: values.iter().map(|v| Value::String((*v).to_string())).collect(),
        }
    }

    /// Create a `Float64` column
    pub fn f64s(name: &str, values: &[f64]) -> Self {
        Self {
            name: name.to_string(),
            data_type: DataType::Float64,
            values: values.iter().map(|v| Value::Float64(*v)).collect(),
        }
    }

    /// Create a `Float64` tensor column of the given shape, one flattened
    /// row-major tensor per row
    pub fn f64_tensors(name: &str, shape: Vec<usize>, values: Vec<Vec<f64>>) -> Result<Self> {
        Self::from_vec(name, DataType::f64_tensor(shape), values)
    }

    /// Get the name of this column
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the data type of this column
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Get the length of this column (number of values)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this column is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the value at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get all values
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
