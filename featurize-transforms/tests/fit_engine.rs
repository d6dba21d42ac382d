use std::sync::Arc;

use featurize_core::{
    Column, ComputationStep, DataType, Error, Estimator, FitResult, InMemoryDataView, Input,
    Result, TrainingState, Transformer,
};
use featurize_transforms::{fit, FitBinding};
use serde::{Deserialize, Serialize};
use test_case::test_case;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Records every submitted row and finishes after a fixed number of passes
#[derive(Debug, Default)]
struct Recorder {
    passes_wanted: usize,
    passes_done: usize,
    reset_after: Option<usize>,
    fail_at: Option<ComputationStep>,
    seen: Vec<(Vec<String>, f64)>,
    completions: usize,
}

impl Recorder {
    fn passes(n: usize) -> Self {
        Self {
            passes_wanted: n,
            ..Self::default()
        }
    }

    fn check(&self, step: ComputationStep) -> Result<()> {
        if self.fail_at == Some(step) {
            return Err(Error::InvalidOperation(format!("injected failure in {}", step)));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Seen {
    rows: Vec<(Vec<String>, f64)>,
    completions: usize,
}

impl Transformer for Seen {
    const KIND: &'static str = "seen";
    type Value = f64;
    type Output = f64;

    fn output_type(&self) -> DataType {
        DataType::Float64
    }

    fn transform(&mut self, input: &Input<f64>) -> Result<f64> {
        Ok(input.value)
    }
}

impl Estimator for Recorder {
    type Transformer = Seen;

    fn training_state(&self) -> Result<TrainingState> {
        self.check(ComputationStep::TrainingState)?;
        if self.passes_done >= self.passes_wanted {
            Ok(TrainingState::Finished)
        } else {
            Ok(TrainingState::Training)
        }
    }

    fn fit(&mut self, input: &Input<f64>) -> Result<FitResult> {
        self.check(ComputationStep::Fit)?;
        self.seen.push((input.grains.clone(), input.value));
        if self.reset_after == Some(self.seen.len()) {
            return Ok(FitResult::ResetAndContinue);
        }
        Ok(FitResult::Continue)
    }

    fn on_data_completed(&mut self) -> Result<()> {
        self.check(ComputationStep::OnDataCompleted)?;
        self.completions += 1;
        self.passes_done += 1;
        Ok(())
    }

    fn complete_training(&mut self) -> Result<()> {
        self.check(ComputationStep::CompleteTraining)
    }

    fn create_transformer(&mut self) -> Result<Seen> {
        self.check(ComputationStep::CreateTransformer)?;
        Ok(Seen {
            rows: std::mem::take(&mut self.seen),
            completions: self.completions,
        })
    }
}

fn view() -> InMemoryDataView {
    InMemoryDataView::from_columns(vec![
        Column::strings("store", &["a", "b", "a"]),
        Column::strings("item", &["x", "x", "y"]),
        Column::f64s("sales", &[1.0, 2.0, f64::NAN]),
    ])
    .unwrap()
}

fn binding() -> FitBinding {
    FitBinding::new(Some("sales".into()), vec!["store".into(), "item".into()])
}

fn values(rows: &[(Vec<String>, f64)]) -> Vec<Option<f64>> {
    rows.iter()
        .map(|(_, v)| (!v.is_nan()).then_some(*v))
        .collect()
}

#[test]
fn test_single_pass_submits_every_row_with_grains() {
    init_tracing();
    let fitted = fit(Recorder::passes(1), &view(), &binding()).unwrap();

    let rows = &fitted.transformer.rows;
    assert_eq!(values(rows), vec![Some(1.0), Some(2.0), None]);
    assert_eq!(rows[0].0, vec!["a".to_string(), "x".to_string()]);
    assert_eq!(rows[1].0, vec!["b".to_string(), "x".to_string()]);
    assert_eq!(rows[2].0, vec!["a".to_string(), "y".to_string()]);
    assert_eq!(fitted.transformer.completions, 1);
    assert_eq!(fitted.report.passes, 1);
    assert_eq!(fitted.report.rows_submitted, 3);
}

#[test_case(2 ; "two passes")]
#[test_case(5 ; "five passes")]
fn test_multiple_passes(passes: usize) {
    init_tracing();
    let fitted = fit(Recorder::passes(passes), &view(), &binding()).unwrap();

    assert_eq!(fitted.transformer.rows.len(), 3 * passes);
    assert_eq!(fitted.transformer.completions, passes);
    assert_eq!(fitted.report.passes, passes as u64);
    for pass in fitted.transformer.rows.chunks(3) {
        assert_eq!(values(pass), vec![Some(1.0), Some(2.0), None]);
    }
}

#[test]
fn test_reset_restarts_from_row_zero() {
    init_tracing();
    let estimator = Recorder {
        reset_after: Some(2),
        ..Recorder::passes(1)
    };
    let fitted = fit(estimator, &view(), &binding()).unwrap();

    assert_eq!(
        values(&fitted.transformer.rows),
        vec![Some(1.0), Some(2.0), Some(1.0), Some(2.0), None]
    );
    // grains were restarted together with the value column
    assert_eq!(fitted.transformer.rows[2].0[0], "a");
    assert_eq!(fitted.transformer.completions, 1);
    assert_eq!(fitted.report.resets, 1);
}

#[test]
fn test_finished_before_first_row_submits_nothing() {
    let fitted = fit(Recorder::passes(0), &view(), &binding()).unwrap();
    assert!(fitted.transformer.rows.is_empty());
    assert_eq!(fitted.transformer.completions, 0);
}

#[test]
fn test_empty_source_still_finalizes() {
    let empty = InMemoryDataView::from_columns(vec![
        Column::strings("store", &[]),
        Column::strings("item", &[]),
        Column::f64s("sales", &[]),
    ])
    .unwrap();
    let fitted = fit(Recorder::passes(1), &empty, &binding()).unwrap();

    assert!(fitted.transformer.rows.is_empty());
    assert_eq!(fitted.transformer.completions, 1);
    assert_eq!(fitted.report.rows_submitted, 0);
}

#[test_case(ComputationStep::TrainingState ; "training state")]
#[test_case(ComputationStep::Fit ; "fit")]
#[test_case(ComputationStep::OnDataCompleted ; "on data completed")]
#[test_case(ComputationStep::CompleteTraining ; "complete training")]
#[test_case(ComputationStep::CreateTransformer ; "create transformer")]
fn test_failure_names_step(step: ComputationStep) {
    let estimator = Recorder {
        fail_at: Some(step),
        ..Recorder::passes(1)
    };
    let err = fit(estimator, &view(), &binding()).unwrap_err();
    assert_eq!(err.step(), Some(step));
    assert!(err.to_string().contains("injected failure"));
}

#[test]
fn test_binding_errors_are_raised_before_training() {
    let missing = FitBinding::new(Some("price".into()), vec![]);
    assert!(matches!(
        fit(Recorder::passes(1), &view(), &missing),
        Err(Error::ColumnNotFound(_))
    ));

    let numeric_grain = FitBinding::new(Some("sales".into()), vec!["sales".into()]);
    assert!(matches!(
        fit(Recorder::passes(1), &view(), &numeric_grain),
        Err(Error::TypeMismatch(_))
    ));
}

#[test]
fn test_fit_through_shared_view() {
    let shared: Arc<dyn featurize_core::DataView> = Arc::new(view());
    let fitted = fit(Recorder::passes(1), shared.as_ref(), &binding()).unwrap();
    assert_eq!(fitted.transformer.rows.len(), 3);
}
