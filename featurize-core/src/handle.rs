//! Owned handle over a finalized computation
//!
//! A handle exclusively owns one computation instance. It can be released
//! explicitly or on drop; releasing twice is a no-op and any use after
//! release fails with [`Error::Disposed`].

use tracing::trace;

use crate::error::{Error, Result};

/// Exclusive owner of a computation instance
#[derive(Debug)]
pub struct ComputationHandle<T> {
    /// Name used in errors and logs
    name: &'static str,

    /// The computation, `None` once released
    inner: Option<T>,
}

impl<T> ComputationHandle<T> {
    /// Take ownership of `inner`
    pub fn new(name: &'static str, inner: T) -> Self {
        Self {
            name,
            inner: Some(inner),
        }
    }

    /// Borrow the computation
    pub fn get(&self) -> Result<&T> {
        self.inner.as_ref().ok_or(Error::Disposed(self.name))
    }

    /// Mutably borrow the computation
    pub fn get_mut(&mut self) -> Result<&mut T> {
        self.inner.as_mut().ok_or(Error::Disposed(self.name))
    }

    /// Release the computation. Returns `false` if it was already released
    pub fn release(&mut self) -> bool {
        match self.inner.take() {
            Some(inner) => {
                trace!(computation = self.name, "releasing computation");
                drop(inner);
                true
            }
            None => false,
        }
    }

    /// Whether the computation has been released
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }
}

impl<T> Drop for ComputationHandle<T> {
    fn drop(&mut self) {
        self.release();
    }
}
