// crates/mldb-scenarios/src/assertions.rs
// ============================================================================
// Module: Scenario Assertions
// Description: Checks applied to service answers between pipeline steps.
// Purpose: Turn unexpected answers into descriptive scenario errors.
// Dependencies: mldb-client, serde_json
// ============================================================================

//! ## Overview
//! Every helper names the step it guards so a failure report points at the
//! exact call that went wrong. Helpers return the checked value so pipelines
//! can keep chaining with `?`.

use mldb_client::MldbError;
use mldb_client::PerformResult;
use mldb_client::QueryRow;
use serde_json::Value;

use crate::scenario::ScenarioError;

/// Requires a status code below 400.
///
/// # Errors
///
/// Returns [`ScenarioError::Assertion`] with the service message otherwise.
pub fn require_ok(step: &str, result: PerformResult) -> Result<PerformResult, ScenarioError> {
    if result.is_success() {
        return Ok(result);
    }
    Err(ScenarioError::Assertion(format!(
        "{step}: expected status < 400, got {}: {}",
        result.status_code,
        result.error_message()
    )))
}

/// Requires an exact row count.
///
/// # Errors
///
/// Returns [`ScenarioError::Assertion`] when the count differs.
pub fn require_row_count(
    step: &str,
    rows: &[QueryRow],
    expected: usize,
) -> Result<(), ScenarioError> {
    if rows.len() == expected {
        return Ok(());
    }
    Err(ScenarioError::Assertion(format!(
        "{step}: expected {expected} rows, got {}",
        rows.len()
    )))
}

/// Requires the first column of `row` to be one of `allowed`.
///
/// # Errors
///
/// Returns [`ScenarioError::Protocol`] for a row without columns and
/// [`ScenarioError::Assertion`] for an unexpected column name.
pub fn require_first_column_in(
    step: &str,
    row: &QueryRow,
    allowed: &[&str],
) -> Result<(), ScenarioError> {
    let Some(first) = row.first_column_name() else {
        return Err(ScenarioError::Protocol(format!("{step}: row {} has no columns", row.row_name)));
    };
    if allowed.contains(&first) {
        return Ok(());
    }
    Err(ScenarioError::Assertion(format!(
        "{step}: first column of row {} is '{first}', expected one of [{}]",
        row.row_name,
        allowed.join(", ")
    )))
}

/// Requires the leading rows to carry exactly the given names, in order.
///
/// Names are compared code point for code point.
///
/// # Errors
///
/// Returns [`ScenarioError::Assertion`] on the first mismatch.
pub fn require_row_names(
    step: &str,
    rows: &[QueryRow],
    expected: &[&str],
) -> Result<(), ScenarioError> {
    if rows.len() < expected.len() {
        return Err(ScenarioError::Assertion(format!(
            "{step}: expected at least {} rows, got {}",
            expected.len(),
            rows.len()
        )));
    }
    for (index, (row, name)) in rows.iter().zip(expected).enumerate() {
        if row.row_name != *name {
            return Err(ScenarioError::Assertion(format!(
                "{step}: row {index} is named '{}', expected '{name}'",
                row.row_name
            )));
        }
    }
    Ok(())
}

/// Requires a query to be rejected with a message containing `fragment`.
///
/// # Errors
///
/// Returns [`ScenarioError::Assertion`] when the query succeeds or fails with
/// a different message, and passes transport failures through.
pub fn require_rejection(
    step: &str,
    outcome: Result<Vec<QueryRow>, MldbError>,
    fragment: &str,
) -> Result<String, ScenarioError> {
    match outcome {
        Ok(rows) => Err(ScenarioError::Assertion(format!(
            "{step}: expected rejection containing '{fragment}', got {} rows",
            rows.len()
        ))),
        Err(MldbError::Status {
            message,
            ..
        }) if message.contains(fragment) => Ok(message),
        Err(MldbError::Status {
            status,
            message,
        }) => Err(ScenarioError::Assertion(format!(
            "{step}: expected message containing '{fragment}', got {status}: {message}"
        ))),
        Err(other) => Err(ScenarioError::Client(other)),
    }
}

/// Requires a numeric value.
///
/// # Errors
///
/// Returns [`ScenarioError::Protocol`] when the value is missing or not a
/// finite number.
pub fn require_number(step: &str, value: Option<&Value>) -> Result<f64, ScenarioError> {
    match value.and_then(Value::as_f64) {
        Some(number) if number.is_finite() => Ok(number),
        _ => Err(ScenarioError::Protocol(format!(
            "{step}: expected a number, got {}",
            value.map_or_else(|| "nothing".to_string(), Value::to_string)
        ))),
    }
}
