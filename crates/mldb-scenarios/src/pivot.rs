// crates/mldb-scenarios/src/pivot.rs
// ============================================================================
// Module: Pivot Transform Scenario
// Description: Pivot query, materializing transform, and non-ASCII group-by.
// Purpose: Check pivot result shape and UTF-8 fidelity of row naming.
// Dependencies: mldb-client, serde_json
// ============================================================================

//! ## Overview
//! Two small `(person, thing, has)` datasets are ingested. The first is
//! pivoted by `thing`/`has` per person, both ad hoc and through a transform
//! procedure, and each resulting row must lead with `appl` or `tsla`. The
//! second spells one person `françois`; a `group by person` count must name
//! its rows `["françois"]` then `["nick"]`, byte for byte.

// ============================================================================
// SECTION: Imports
// ============================================================================

use mldb_client::Cell;
use mldb_client::CellValue;
use mldb_client::DatasetConfig;
use mldb_client::InputData;
use mldb_client::OutputDataset;
use mldb_client::QueryRow;
use mldb_client::ResourceConfig;
use serde_json::Value;
use serde_json::json;

use crate::assertions::require_first_column_in;
use crate::assertions::require_ok;
use crate::assertions::require_row_count;
use crate::assertions::require_row_names;
use crate::scenario::ScenarioContext;
use crate::scenario::ScenarioError;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Dataset pivoted by the first half of the scenario.
pub const PIVOT_SOURCE: &str = "example";
/// Dataset materialized by the pivot transform.
pub const PIVOT_OUTPUT: &str = "example2";
/// Dataset with non-ASCII person names.
pub const GROUP_SOURCE: &str = "example3";
/// Transform procedure materializing the pivot.
pub const PIVOT_PROCEDURE: &str = "example2_creator";

/// Accepted leading columns of pivoted rows.
pub const PIVOT_LEADING_COLUMNS: [&str; 2] = ["tsla", "appl"];
/// Expected group-by row names, in order.
pub const GROUP_ROW_NAMES: [&str; 2] = ["[\"françois\"]", "[\"nick\"]"];

/// Ownership facts as `(row, person, thing, has)`.
const HOLDINGS: [(&str, &str, &str, i64); 4] = [
    ("r1", "nick", "appl", 1),
    ("r2", "nick", "goog", 2),
    ("r3", "francois", "appl", 3),
    ("r4", "francois", "tsla", 4),
];

/// Returns the pivot statement over `dataset`.
#[must_use]
pub fn pivot_sql(dataset: &str) -> String {
    format!("select pivot(thing, has) as * from {dataset} group by person")
}

/// Returns the cells of one ownership fact with `person` substituted.
#[must_use]
pub fn holding_cells(person: &str, thing: &str, has: i64) -> Vec<Cell> {
    vec![
        Cell::new("person", person, 0),
        Cell::new("thing", thing, 0),
        Cell::new("has", CellValue::Integer(has), 0),
    ]
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Runs the pivot transform pipeline.
///
/// # Errors
///
/// Returns [`ScenarioError`] on the first failed step.
pub fn run(ctx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError> {
    ingest(ctx, PIVOT_SOURCE, |person| person)?;

    let pivot = ctx.client().query(&pivot_sql(PIVOT_SOURCE))?;
    ctx.log_detail("ad hoc pivot", rows_detail(&pivot));

    let config = ResourceConfig::new(
        "transform",
        json!({
            "inputData": InputData::from(pivot_sql(PIVOT_SOURCE)),
            "outputDataset": OutputDataset::sparse_mutable(PIVOT_OUTPUT),
        }),
    );
    let result = ctx.client().put_procedure(PIVOT_PROCEDURE, &config)?;
    ctx.log_result("pivot procedure creation", &result);
    require_ok("create pivot procedure", result)?;

    let result = ctx.client().run_procedure(PIVOT_PROCEDURE)?;
    ctx.log_result("pivot procedure run", &result);
    require_ok("run pivot procedure", result)?;

    let rows = ctx.client().query(&format!("select * from {PIVOT_OUTPUT}"))?;
    ctx.log_detail("materialized pivot", rows_detail(&rows));
    require_row_count("materialized pivot", &rows, 2)?;
    for row in &rows {
        require_first_column_in("materialized pivot", row, &PIVOT_LEADING_COLUMNS)?;
    }
    ctx.record_metric("pivot_rows", rows.len());

    ingest(ctx, GROUP_SOURCE, |person| if person == "francois" { "françois" } else { person })?;
    let groups =
        ctx.client().query(&format!("select count(*) from {GROUP_SOURCE} group by person"))?;
    ctx.log_detail("non-ascii group by", rows_detail(&groups));
    require_row_names("non-ascii group by", &groups, &GROUP_ROW_NAMES)?;
    ctx.record_metric(
        "group_rows",
        Value::Array(groups.iter().map(|row| Value::String(row.row_name.clone())).collect()),
    );
    Ok(())
}

/// Records the ownership facts into `dataset`, renaming people on the way.
fn ingest(
    ctx: &ScenarioContext<'_>,
    dataset_id: &str,
    rename: impl Fn(&'static str) -> &'static str,
) -> Result<(), ScenarioError> {
    let mut dataset = ctx.client().create_dataset(&DatasetConfig::sparse_mutable(dataset_id))?;
    for (row, person, thing, has) in HOLDINGS {
        dataset.record_row(row, holding_cells(rename(person), thing, has))?;
    }
    ctx.log("Committing dataset");
    dataset.commit()?;
    Ok(())
}

/// Serializes query rows for logging.
fn rows_detail(rows: &[QueryRow]) -> Value {
    serde_json::to_value(rows).unwrap_or(Value::Null)
}
