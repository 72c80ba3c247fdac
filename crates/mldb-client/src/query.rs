// crates/mldb-client/src/query.rs
// ============================================================================
// Module: Query Results
// Description: Ad-hoc SQL queries and row decoding.
// Purpose: Decode `/v1/query` responses into typed rows.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! `/v1/query` answers with an array of row objects, each carrying a
//! `rowName` and an ordered list of `[columnName, value, timestamp]` tuples.
//! Group-by queries name their rows after the group key rendered as a JSON
//! array, for example `["nick"]`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::client::Method;
use crate::client::MldbClient;
use crate::client::MldbError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One `[columnName, value, timestamp]` tuple.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueryColumn(pub String, pub Value, pub Value);

impl QueryColumn {
    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Column value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.1
    }

    /// Column timestamp as reported by the service.
    #[must_use]
    pub const fn timestamp(&self) -> &Value {
        &self.2
    }
}

/// One result row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRow {
    /// Row name.
    pub row_name: String,
    /// Columns in service order.
    #[serde(default)]
    pub columns: Vec<QueryColumn>,
}

impl QueryRow {
    /// Returns the value of the last column with the given name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns.iter().rev().find(|column| column.name() == name).map(QueryColumn::value)
    }

    /// Returns the name of the first column.
    #[must_use]
    pub fn first_column_name(&self) -> Option<&str> {
        self.columns.first().map(QueryColumn::name)
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(QueryColumn::name).collect()
    }

    /// Parses a group-by row name (`["key", ...]`) into its key values.
    #[must_use]
    pub fn group_key(&self) -> Option<Vec<Value>> {
        serde_json::from_str(&self.row_name).ok()
    }
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes a query response body into rows.
///
/// # Errors
///
/// Returns [`MldbError::Json`] when the body is not an array of row objects.
pub fn decode_rows(response: &Value) -> Result<Vec<QueryRow>, MldbError> {
    if !response.is_array() {
        return Err(MldbError::Json(format!(
            "query response must be an array of rows, got {}",
            json_kind(response)
        )));
    }
    serde_json::from_value(response.clone())
        .map_err(|err| MldbError::Json(format!("invalid query row payload: {err}")))
}

/// Names the JSON kind of a value for error messages.
const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl MldbClient {
    /// Runs `GET /v1/query?q=<sql>` and decodes the rows.
    ///
    /// # Errors
    ///
    /// Returns [`MldbError::Status`] when the status is not 200, carrying the
    /// service's error message, and [`MldbError::Json`] for malformed rows.
    pub fn query(&self, sql: &str) -> Result<Vec<QueryRow>, MldbError> {
        let result = self.perform(Method::Get, "/v1/query", &[("q", sql)], None)?;
        let result = result.require_status(200)?;
        decode_rows(&result.response)
    }
}
