//! Typed row values and conversions between them and Rust types
//!
//! A [`Value`] is what a cursor hands out for one column of the current row.
//! [`FromValue`] and [`IntoValue`] are the bridge between those values and
//! the concrete types a computation consumes or produces. The conversion for
//! a column is selected once, when a computation is bound to a schema, via
//! [`FromValue::accepts`].

use crate::error::{Error, Result};
use crate::schema::DataType;

/// A single column value of the current row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 32-bit unsigned integer
    UInt32(u32),
    /// 32-bit float, NaN marks a missing value
    Float32(f32),
    /// 64-bit float, NaN marks a missing value
    Float64(f64),
    /// UTF-8 string
    String(String),
    /// Row-major `Float32` tensor
    Float32Tensor(Vec<f32>),
    /// Row-major `Float64` tensor
    Float64Tensor(Vec<f64>),
}

impl Value {
    /// Name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::UInt32(_) => "UInt32",
            Value::Float32(_) => "Float32",
            Value::Float64(_) => "Float64",
            Value::String(_) => "String",
            Value::Float32Tensor(_) => "Tensor(Float32)",
            Value::Float64Tensor(_) => "Tensor(Float64)",
        }
    }

    /// Check whether this value is a valid instance of `data_type`,
    /// including the element count of tensors
    pub fn matches(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Boolean(_), DataType::Boolean)
            | (Value::Int32(_), DataType::Int32)
            | (Value::Int64(_), DataType::Int64)
            | (Value::UInt32(_), DataType::UInt32)
            | (Value::Float32(_), DataType::Float32)
            | (Value::Float64(_), DataType::Float64)
            | (Value::String(_), DataType::String) => true,
            (Value::Float32Tensor(values), DataType::Tensor(inner, _)) => {
                **inner == DataType::Float32 && values.len() == data_type.element_count()
            }
            (Value::Float64Tensor(values), DataType::Tensor(inner, _)) => {
                **inner == DataType::Float64 && values.len() == data_type.element_count()
            }
            _ => false,
        }
    }

    /// Read element `index` of a floating point tensor as `f64`
    pub fn tensor_element(&self, index: usize) -> Option<f64> {
        match self {
            Value::Float32Tensor(values) => values.get(index).map(|v| f64::from(*v)),
            Value::Float64Tensor(values) => values.get(index).copied(),
            _ => None,
        }
    }
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(Error::TypeMismatch(format!(
        "expected {}, got {}",
        expected,
        value.type_name()
    )))
}

/// Conversion from a row value into a computation's input type
pub trait FromValue: Sized {
    /// Whether a column of `data_type` can feed this type
    fn accepts(data_type: &DataType) -> bool;

    /// Convert a value read from an accepted column
    fn from_value(value: Value) -> Result<Self>;

    /// Produce the input when no value column is bound
    fn unbound() -> Result<Self> {
        Err(Error::InvalidArgument(
            "an input column is required".to_string(),
        ))
    }
}

/// Conversion from a computation's output type into a row value
pub trait IntoValue {
    /// Convert into a row value
    fn into_value(self) -> Value;
}

impl FromValue for () {
    fn accepts(_data_type: &DataType) -> bool {
        false
    }

    fn from_value(_value: Value) -> Result<Self> {
        Ok(())
    }

    fn unbound() -> Result<Self> {
        Ok(())
    }
}

impl FromValue for bool {
    fn accepts(data_type: &DataType) -> bool {
        *data_type == DataType::Boolean
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(v) => Ok(v),
            other => mismatch("Boolean", &other),
        }
    }
}

impl FromValue for String {
    fn accepts(data_type: &DataType) -> bool {
        *data_type == DataType::String
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(v) => Ok(v),
            other => mismatch("String", &other),
        }
    }
}

impl FromValue for i32 {
    fn accepts(data_type: &DataType) -> bool {
        *data_type == DataType::Int32
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int32(v) => Ok(v),
            other => mismatch("Int32", &other),
        }
    }
}

impl FromValue for i64 {
    fn accepts(data_type: &DataType) -> bool {
        matches!(
            data_type,
            DataType::Int32 | DataType::Int64 | DataType::UInt32
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int32(v) => Ok(i64::from(v)),
            Value::Int64(v) => Ok(v),
            Value::UInt32(v) => Ok(i64::from(v)),
            other => mismatch("an integer", &other),
        }
    }
}

impl FromValue for u32 {
    fn accepts(data_type: &DataType) -> bool {
        *data_type == DataType::UInt32
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::UInt32(v) => Ok(v),
            other => mismatch("UInt32", &other),
        }
    }
}

impl FromValue for f32 {
    fn accepts(data_type: &DataType) -> bool {
        *data_type == DataType::Float32
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float32(v) => Ok(v),
            other => mismatch("Float32", &other),
        }
    }
}

impl FromValue for f64 {
    fn accepts(data_type: &DataType) -> bool {
        data_type.is_numeric()
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float64(v) => Ok(v),
            Value::Float32(v) => Ok(f64::from(v)),
            Value::Int32(v) => Ok(f64::from(v)),
            Value::UInt32(v) => Ok(f64::from(v)),
            Value::Int64(v) => Ok(v as f64),
            other => mismatch("a numeric value", &other),
        }
    }
}

impl FromValue for Vec<f32> {
    fn accepts(data_type: &DataType) -> bool {
        matches!(data_type, DataType::Tensor(inner, _) if **inner == DataType::Float32)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float32Tensor(v) => Ok(v),
            other => mismatch("Tensor(Float32)", &other),
        }
    }
}

impl FromValue for Vec<f64> {
    fn accepts(data_type: &DataType) -> bool {
        matches!(data_type, DataType::Tensor(inner, _) if **inner == DataType::Float64)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float64Tensor(v) => Ok(v),
            other => mismatch("Tensor(Float64)", &other),
        }
    }
}

macro_rules! into_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }
        )*
    };
}

into_value! {
    bool => Boolean,
    i32 => Int32,
    i64 => Int64,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Vec<f32> => Float32Tensor,
    Vec<f64> => Float64Tensor,
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}
