//! Core traits, data structures, and abstractions for streaming featurizers
//!
//! This crate provides the foundational pieces the fit/transform protocol is
//! built on: the schema and typed row values, restartable data views and
//! their forward-only row cursors, the estimator/transformer computation
//! traits, the owned computation handle, and the persisted state framing.

#![warn(missing_docs)]

pub mod column;
pub mod dataset;
pub mod error;
pub mod handle;
pub mod record_batch;
pub mod schema;
pub mod source;
pub mod state;
pub mod transform;
pub mod value;

// Re-export key types for convenience
pub use column::Column;
pub use dataset::InMemoryDataView;
pub use error::{ComputationStep, Error, Result};
pub use handle::ComputationHandle;
pub use record_batch::RecordBatch;
pub use schema::{DataType, Field, Schema};
pub use source::{DataView, RowCursor, RowCursorExt};
pub use transform::{Estimator, FitResult, Input, InputOf, TrainingState, Transformer};
pub use value::{FromValue, IntoValue, Value};
