//! Computation traits for incremental training and row transformation
//!
//! A featurizer is a pair of stateful computations. The [`Estimator`] is
//! the trainable half: it is fed one [`Input`] per row and reports through
//! [`TrainingState`] and [`FitResult`] whether it needs more data, a restart
//! of the current pass, or nothing further. Once training completes it
//! produces a [`Transformer`], the finalized half, which only serves
//! transform requests and can be persisted as an opaque state blob.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::schema::DataType;
use crate::value::{FromValue, IntoValue};

/// Training state of an estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainingState {
    /// More data is required
    Training,
    /// Training needs no further data; no more rows may be submitted
    Finished,
}

/// Outcome of submitting one row to an estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitResult {
    /// Keep feeding rows
    Continue,
    /// Restart the row source from row zero and keep feeding rows
    ResetAndContinue,
    /// No further data is required
    Complete,
}

/// One row as seen by a computation: its grain keys and its value
#[derive(Debug, Clone, PartialEq)]
pub struct Input<T> {
    /// Values of the grain columns, in binding order
    pub grains: Vec<String>,

    /// Value of the bound input column
    pub value: T,
}

impl<T> Input<T> {
    /// Create an input for a grouped computation
    pub fn new(grains: Vec<String>, value: T) -> Self {
        Self { grains, value }
    }

    /// Create an input without grain keys
    pub fn ungrouped(value: T) -> Self {
        Self {
            grains: Vec::new(),
            value,
        }
    }
}

/// Input value type consumed by an estimator
pub type InputOf<E> = <<E as Estimator>::Transformer as Transformer>::Value;

/// The trainable half of a featurizer
pub trait Estimator: Send {
    /// The finalized computation produced by training
    type Transformer: Transformer;

    /// Current training state
    fn training_state(&self) -> Result<TrainingState>;

    /// Submit one row
    fn fit(&mut self, input: &Input<InputOf<Self>>) -> Result<FitResult>;

    /// Signal that the current pass reached the end of the data
    fn on_data_completed(&mut self) -> Result<()>;

    /// Finish training once no more rows will be submitted
    fn complete_training(&mut self) -> Result<()>;

    /// Build the finalized computation from the trained state
    fn create_transformer(&mut self) -> Result<Self::Transformer>;
}

/// The finalized half of a featurizer
///
/// The serde representation is the computation's opaque persisted state;
/// `Load(Save(x))` must transform identically to `x`.
pub trait Transformer: Serialize + DeserializeOwned + Send {
    /// Kind tag written into persisted state and checked on load
    const KIND: &'static str;

    /// Input value type
    type Value: FromValue;

    /// Output value type
    type Output: IntoValue;

    /// Type of the values produced by [`Transformer::transform`]
    fn output_type(&self) -> DataType;

    /// Transform one row
    fn transform(&mut self, input: &Input<Self::Value>) -> Result<Self::Output>;

    /// Check the invariants of a reconstructed state; called on every load
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
