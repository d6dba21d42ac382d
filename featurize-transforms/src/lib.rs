//! Fit engine, row adapters and time-series featurizers
//!
//! This crate drives [`featurize_core`] computations through training and
//! serves their results to downstream consumers:
//!
//! - [`fit()`] runs the incremental-training state machine over a
//!   restartable data view, including multi-pass resets.
//! - [`ColumnTransformer`] appends a lazily computed column.
//! - [`DropTransformer`] and [`PivotTransformer`] change the number of rows,
//!   dropping short grains or pivoting tensor columns into horizon rows.
//! - [`RollingWindowOptions`], [`LagOptions`] and [`ShortDropOptions`]
//!   configure the concrete featurizers.

#![warn(missing_docs)]

pub mod column;
pub mod drop;
pub mod estimator;
pub mod fit;
pub mod fitted;
pub mod lag;
pub mod pivot;
pub mod rolling_window;
pub mod short_drop;

pub use column::{fit_column, ColumnBinding, ColumnTransformer, TransformedView};
pub use drop::{DropTransformer, DropView, GrainFilter};
pub use estimator::OnePassEstimator;
pub use fit::{fit, FitBinding, FitReport, Fitted, ResolvedBinding};
pub use fitted::FittedState;
pub use lag::{LagOptions, LagTransformer};
pub use pivot::{PivotOptions, PivotTransformer, PivotView, DEFAULT_HORIZON_COLUMN};
pub use rolling_window::{RollingWindowOptions, RollingWindowTransformer, WindowCalculation};
pub use short_drop::{ShortDropEstimator, ShortDropOptions, ShortDropTransformer};
