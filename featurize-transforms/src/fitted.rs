//! Saved state of a finalized computation, shared by the views built on it

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use featurize_core::error::Result;
use featurize_core::handle::ComputationHandle;
use featurize_core::state::{load_transformer, save_transformer};
use featurize_core::transform::Transformer;

/// Immutable saved state from which independent computation instances are
/// reconstructed, one per cursor
pub struct FittedState<T> {
    bytes: Arc<[u8]>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Transformer> FittedState<T> {
    /// Capture the state of `transformer`
    pub fn capture(transformer: &T) -> Result<Self> {
        Ok(Self::from_bytes(save_transformer(transformer)?))
    }

    /// Wrap a saved state blob, validating it by loading it once
    pub fn restore(bytes: Vec<u8>) -> Result<Self> {
        load_transformer::<T>(&bytes)?;
        Ok(Self::from_bytes(bytes))
    }

    fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
            _marker: PhantomData,
        }
    }

    /// Reconstruct an independent computation instance
    pub fn instantiate(&self) -> Result<T> {
        load_transformer(&self.bytes)
    }

    /// Reconstruct an independent instance owned by a handle
    pub fn open(&self) -> Result<ComputationHandle<T>> {
        Ok(ComputationHandle::new(T::KIND, self.instantiate()?))
    }

    /// The saved state blob
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<T> Clone for FittedState<T> {
    fn clone(&self) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for FittedState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedState")
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
