//! JSON codec and request application.
//!
//! Decodes batches and scripts, applies decoded requests to a [`Store`], and
//! encodes the resulting reports.

use serde_json::Value as Json;
use thiserror::Error;

use modelstore_core::{
    ComputeContext, ComputedSpec, ConfigError, ModelSpec, ModelUpdate, Path,
    RunLoopException, Store, StoreError, Value,
};

use crate::messages::{
    Batch, FailureRecord, Formula, ReadResult, Rejection, RunReport, Script, UpdateRequest,
};

/// Errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON (de)serialization failed.
    #[error("Failed to process message: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// A script carried an unusable store configuration.
    #[error("Invalid script configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Decode a batch of update requests.
pub fn decode_batch(text: &str) -> Result<Batch, CodecError> {
    serde_json::from_str(text).map_err(CodecError::from)
}

/// Decode a script, validating its configuration.
pub fn decode_script(text: &str) -> Result<Script, CodecError> {
    let script: Script = serde_json::from_str(text)?;
    script.config.validate()?;
    Ok(script)
}

/// Encode a run report.
pub fn encode_report(report: &RunReport) -> Result<String, CodecError> {
    serde_json::to_string(report).map_err(CodecError::from)
}

/// Apply a single request to the store.
///
/// List operations that fail on the stored value still succeed here; they
/// leave a fault value at the path.
pub fn apply_request(store: &mut Store, request: &UpdateRequest) -> Result<(), StoreError> {
    match request {
        UpdateRequest::Set { path, value } => store.set(path, value.clone()),
        UpdateRequest::SetModel { path, model } => {
            store.set_model(path, ModelSpec::tree(model.clone()))
        }
        UpdateRequest::Append {
            path,
            values,
            list_kind,
        } => {
            let mut update = ModelUpdate::append_all(path.clone(), values.clone());
            if let Some(kind) = list_kind {
                update = update.with_list_kind(*kind);
            }
            store.handle_update(update)
        }
        UpdateRequest::Prepend {
            path,
            values,
            list_kind,
        } => {
            let mut update = ModelUpdate::prepend_all(path.clone(), values.clone());
            if let Some(kind) = list_kind {
                update = update.with_list_kind(*kind);
            }
            store.handle_update(update)
        }
        UpdateRequest::RemoveIndex { path, index } => {
            store.handle_update(ModelUpdate::remove_index(path.clone(), *index))
        }
        UpdateRequest::RemoveWhere { path, predicate } => {
            let predicate = predicate.clone();
            store.handle_update(ModelUpdate::remove_all_that_match(
                path.clone(),
                move |index, item| predicate.matches(index, item),
            ))
        }
        UpdateRequest::KeepWhere { path, predicate } => {
            let predicate = predicate.clone();
            store.handle_update(ModelUpdate::keep_all_that_match(
                path.clone(),
                move |index, item| predicate.matches(index, item),
            ))
        }
        UpdateRequest::RemoveEqualTo { path, value } => {
            store.handle_update(ModelUpdate::remove_all_equal_to(path.clone(), value.clone()))
        }
        UpdateRequest::Sort {
            path,
            descending: false,
        } => store.handle_update(ModelUpdate::sort(path.clone())),
        UpdateRequest::Sort {
            path,
            descending: true,
        } => store.handle_update(ModelUpdate::sort_descending(path.clone())),
        UpdateRequest::Delete { path } => store.delete_model(path),
        UpdateRequest::Move { from, to } => store.move_model(from, to),
        UpdateRequest::Compute {
            path,
            formula,
            cacheable,
            immediate,
        } => {
            let mut spec = formula_spec(formula.clone());
            if let Some(cacheable) = cacheable {
                spec = spec.cacheable(*cacheable);
            }
            if let Some(immediate) = immediate {
                spec = spec.immediate(*immediate);
            }
            store.define_computed(path, spec)
        }
    }
}

/// Apply every request of a batch, then run the loop once.
pub fn run_batch(store: &mut Store, index: usize, batch: &Batch) -> RunReport {
    let mut applied = 0;
    let mut rejected = Vec::new();
    for (position, request) in batch.updates.iter().enumerate() {
        match apply_request(store, request) {
            Ok(()) => applied += 1,
            Err(error) => rejected.push(Rejection {
                index: position,
                error: error.to_string(),
            }),
        }
    }
    let failures = store.run_loop().iter().map(failure_record).collect();

    let mut report = RunReport::new(index);
    report.applied = applied;
    report.rejected = rejected;
    report.failures = failures;
    report
}

/// Read the value at each path.
pub fn read_paths(store: &mut Store, paths: &[Path]) -> Vec<ReadResult> {
    paths
        .iter()
        .map(|path| match store.get_value(path, None) {
            Ok(value) => ReadResult {
                path: path.clone(),
                value: Some(value.map(|v| v.to_json()).unwrap_or(Json::Null)),
                error: None,
            },
            Err(error) => ReadResult {
                path: path.clone(),
                value: None,
                error: Some(error.to_string()),
            },
        })
        .collect()
}

pub fn failure_record(exception: &RunLoopException) -> FailureRecord {
    FailureRecord {
        observer: exception.observer().to_string(),
        iteration: exception.iteration(),
        error: exception.error().to_string(),
    }
}

/// Computed model definition for a formula.
pub fn formula_spec(formula: Formula) -> ComputedSpec {
    match formula {
        Formula::Sum { inputs, offset } => ComputedSpec::new(move |ctx| {
            let values = read_numbers(ctx, &inputs)?;
            Ok(combine(values, offset, |a, b| a.checked_add(b), |a, b| a + b))
        }),
        Formula::Product { inputs } => ComputedSpec::new(move |ctx| {
            let values = read_numbers(ctx, &inputs)?;
            Ok(combine(values, 1, |a, b| a.checked_mul(b), |a, b| a * b))
        }),
        Formula::Count { input } => ComputedSpec::new(move |ctx| {
            let value = ctx.get_value(&input)?;
            match value.as_json() {
                Some(Json::Null) => Ok(Value::from(0)),
                _ => value
                    .list_len()
                    .map(|len| Value::from(len as u64))
                    .ok_or_else(|| {
                        ctx.fail(format!("input {} is {}, expected a list", input, value.type_name()))
                    }),
            }
        }),
    }
}

fn read_numbers(ctx: &mut ComputeContext<'_>, inputs: &[Path]) -> Result<Vec<Json>, StoreError> {
    let mut values = Vec::with_capacity(inputs.len());
    for input in inputs {
        let value = ctx.get_value(input)?;
        match value.as_json() {
            Some(number @ Json::Number(_)) => values.push(number.clone()),
            _ => {
                return Err(ctx.fail(format!(
                    "input {} is {}, expected a number",
                    input,
                    value.type_name()
                )))
            }
        }
    }
    Ok(values)
}

/// Fold numbers with integer arithmetic while every value is an integer
/// and nothing overflows, with float arithmetic otherwise.
fn combine(
    values: Vec<Json>,
    start: i64,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Value {
    let integers = values
        .iter()
        .try_fold(start, |acc, value| value.as_i64().and_then(|n| int_op(acc, n)));
    match integers {
        Some(total) => Value::from(total),
        None => Value::from(
            values
                .iter()
                .filter_map(Json::as_f64)
                .fold(start as f64, float_op),
        ),
    }
}
