//! Schema definition for row-oriented featurizer data

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Data type for column values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean type
    Boolean,

    /// 32-bit signed integer
    Int32,

    /// 64-bit signed integer
    Int64,

    /// 32-bit unsigned integer
    UInt32,

    /// 32-bit floating point
    Float32,

    /// 64-bit floating point
    Float64,

    /// UTF-8 encoded string
    String,

    /// Fixed-shape dense tensor stored row-major, e.g. `[rows, width]`
    Tensor(Box<DataType>, Vec<usize>),
}

impl DataType {
    /// Convenience constructor for a `Float64` tensor of the given shape
    pub fn f64_tensor(shape: Vec<usize>) -> Self {
        DataType::Tensor(Box::new(DataType::Float64), shape)
    }

    /// Convenience constructor for a `Float32` tensor of the given shape
    pub fn f32_tensor(shape: Vec<usize>) -> Self {
        DataType::Tensor(Box::new(DataType::Float32), shape)
    }

    /// Check if this type is a floating point scalar
    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Check if this type is a numeric scalar
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int32
                | DataType::Int64
                | DataType::UInt32
                | DataType::Float32
                | DataType::Float64
        )
    }

    /// Check if this type is a tensor
    pub fn is_tensor(&self) -> bool {
        matches!(self, DataType::Tensor(_, _))
    }

    /// Element type of a tensor, or the type itself for scalars
    pub fn element_type(&self) -> &DataType {
        match self {
            DataType::Tensor(inner, _) => inner,
            other => other,
        }
    }

    /// Shape of a tensor; scalars have an empty shape
    pub fn shape(&self) -> &[usize] {
        match self {
            DataType::Tensor(_, shape) => shape,
            _ => &[],
        }
    }

    /// Number of scalar elements held by one value of this type
    pub fn element_count(&self) -> usize {
        match self {
            DataType::Tensor(_, shape) => shape.iter().product(),
            _ => 1,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "Boolean"),
            DataType::Int32 => write!(f, "Int32"),
            DataType::Int64 => write!(f, "Int64"),
            DataType::UInt32 => write!(f, "UInt32"),
            DataType::Float32 => write!(f, "Float32"),
            DataType::Float64 => write!(f, "Float64"),
            DataType::String => write!(f, "String"),
            DataType::Tensor(item_type, shape) => {
                write!(f, "Tensor({}, [", item_type)?;
                for (i, dim) in shape.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", dim)?;
                }
                write!(f, "])")
            }
        }
    }
}

/// A field in a schema, with a name and data type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Name of the field
    pub name: String,

    /// Data type of the field
    pub data_type: DataType,
}

impl Field {
    /// Create a new field
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
        }
    }

    /// Get the name of this field
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the data type of this field
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.data_type)
    }
}

/// A schema describing the columns of a data view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Fields in this schema
    fields: Vec<Field>,

    /// Field indices by name for faster lookup
    field_indices: HashMap<String, usize>,
}

impl Schema {
    /// Create a new schema with the given fields.
    ///
    /// When names repeat, lookups by name resolve to the last field.
    pub fn new(fields: Vec<Field>) -> Self {
        let mut field_indices = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            field_indices.insert(field.name.clone(), i);
        }

        Self {
            fields,
            field_indices,
        }
    }

    /// Get all fields in this schema
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get a field by index
    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Get a field by name
    pub fn field_by_name(&self, name: &str) -> Result<&Field> {
        let index = self.index_of(name)?;
        Ok(&self.fields[index])
    }

    /// Get the index of a field by name
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.field_indices
            .get(name)
            .copied()
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    /// Get the number of fields in this schema
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if this schema is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Create a new schema with `field` appended
    pub fn with_field(&self, field: Field) -> Self {
        let mut fields = self.fields.clone();
        fields.push(field);
        Self::new(fields)
    }

    /// Resolve a column that must be a string, e.g. a grain column
    pub fn string_column(&self, name: &str) -> Result<usize> {
        let index = self.index_of(name)?;
        match self.fields[index].data_type() {
            DataType::String => Ok(index),
            other => Err(Error::TypeMismatch(format!(
                "column '{}' must be String, found {}",
                name, other
            ))),
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schema: {} fields", self.fields.len())?;
        for field in &self.fields {
            writeln!(f, "  {}", field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(vec![
            Field::new("grain", DataType::String),
            Field::new("value", DataType::Float64),
            Field::new("window", DataType::f64_tensor(vec![1, 3])),
        ])
    }

    #[test]
    fn test_lookup_by_name() {
        let schema = sample();
        assert_eq!(schema.index_of("value").unwrap(), 1);
        assert!(matches!(
            schema.index_of("missing"),
            Err(Error::ColumnNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_tensor_shape() {
        let schema = sample();
        let window = schema.field_by_name("window").unwrap().data_type();
        assert_eq!(window.shape(), &[1, 3]);
        assert_eq!(window.element_type(), &DataType::Float64);
        assert_eq!(window.element_count(), 3);
        assert_eq!(window.to_string(), "Tensor(Float64, [1, 3])");
    }

    #[test]
    fn test_string_column_rejects_numeric() {
        let schema = sample();
        assert_eq!(schema.string_column("grain").unwrap(), 0);
        assert!(matches!(
            schema.string_column("value"),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_with_field_appends() {
        let schema = sample().with_field(Field::new("out", DataType::Boolean));
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.index_of("out").unwrap(), 3);
    }
}
