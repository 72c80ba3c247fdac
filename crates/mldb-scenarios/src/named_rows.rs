// crates/mldb-scenarios/src/named_rows.rs
// ============================================================================
// Module: Named Rows Scenario
// Description: Error reporting for invalid `NAMED` row expressions.
// Purpose: Pin the service's messages for null, empty and non-scalar names.
// Dependencies: mldb-client
// ============================================================================

//! ## Overview
//! `ds` holds two sparse rows, only one of which has `behA`. Naming rows
//! after `behA` works once the null row is filtered out, and must fail with a
//! specific message otherwise. An empty string literal and a row expression
//! are rejected as names too.

use mldb_client::Cell;
use mldb_client::DatasetConfig;

use crate::assertions::require_rejection;
use crate::assertions::require_row_count;
use crate::scenario::ScenarioContext;
use crate::scenario::ScenarioError;

/// Sparse source dataset.
pub const DATASET: &str = "ds";

/// Query that names rows only where the name column is present.
pub const FILTERED_QUERY: &str = "SELECT * NAMED behA FROM ds WHERE behA IS NOT NULL";

/// Queries that must be rejected, with the expected message fragment.
pub const REJECTED_QUERIES: [(&str, &str); 3] = [
    ("SELECT * NAMED behA FROM ds", "Can't create a row with a null or empty name."),
    ("SELECT * NAMED '' FROM ds", "Can't create a row with an empty name."),
    ("SELECT * NAMED {1} FROM ds", "NAMED expression must evaluate to a single value"),
];

/// Runs the named rows pipeline.
///
/// # Errors
///
/// Returns [`ScenarioError`] on the first failed step.
pub fn run(ctx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError> {
    let mut dataset = ctx.client().create_dataset(&DatasetConfig::sparse_mutable(DATASET))?;
    dataset.record_row("row1", vec![Cell::new("behA", "a", 0)])?;
    dataset.record_row("row2", vec![Cell::new("behB", "b", 0)])?;
    dataset.commit()?;

    let rows = ctx.client().query(FILTERED_QUERY)?;
    require_row_count("filtered NAMED query", &rows, 1)?;

    for (sql, fragment) in REJECTED_QUERIES {
        let message = require_rejection(sql, ctx.client().query(sql), fragment)?;
        ctx.log(&message);
    }
    ctx.record_metric("rejections", REJECTED_QUERIES.len());
    Ok(())
}
