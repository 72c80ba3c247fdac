// system-tests/tests/helpers/mldb_stub.rs
// ============================================================================
// Module: MLDB Stub
// Description: In-process MLDB stand-in for system-tests.
// Purpose: Run the scenarios end to end without an external service.
// Dependencies: tiny_http, url, percent-encoding, serde_json, sha2
// ============================================================================

//! ## Overview
//! The stub keeps datasets, functions, and procedures in memory and answers
//! the REST routes the scenarios use. Its SQL support covers exactly the
//! statement shapes the suites issue:
//! - `select * from ds [where rowHash() % N = K | != K | col IS NOT NULL]`
//! - `select * NAMED expr from ds [where ...]`
//! - `select pivot(a, b) as * from ds group by col`
//! - `select count(*) from ds [group by col]`
//!
//! Rows become visible to queries only after their dataset is committed.
//! Group row names are JSON arrays of the group key, ordered by their UTF-8
//! encoding.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use percent_encoding::percent_decode_str;
use serde_json::Value;
use serde_json::json;
use sha2::Digest;
use sha2::Sha256;
use tiny_http::Header;
use tiny_http::Request;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

/// Function type that hashes column names into buckets.
const HASHED_COLUMN: &str = "experimental.feature_generator.hashed_column";
/// Function type that scores rows with a trained model.
const CLASSIFIER: &str = "classifier";
/// Function types the stub accepts.
const FUNCTION_TYPES: [&str; 2] = [HASHED_COLUMN, CLASSIFIER];
/// Procedure types the stub can run.
const PROCEDURE_TYPES: [&str; 3] = ["transform", "classifier.train", "classifier.test"];
/// Label column read by `classifier.test`.
const LABEL_COLUMN: &str = "LABEL";

// ============================================================================
// SECTION: Stub State
// ============================================================================

/// Status code paired with a JSON body.
type Reply = (u16, Value);

/// One stored row.
#[derive(Debug, Clone)]
struct StubRow {
    /// Row name.
    name: String,
    /// `(column, value, timestamp)` cells in recording order.
    cells: Vec<(String, Value, Value)>,
}

impl StubRow {
    /// Returns the last value recorded for `column`.
    fn value(&self, column: &str) -> Option<&Value> {
        self.cells.iter().rev().find(|(name, _, _)| name == column).map(|(_, value, _)| value)
    }

    /// Encodes the row the way `/v1/query` returns it.
    fn to_json(&self) -> Value {
        let columns: Vec<Value> = self
            .cells
            .iter()
            .map(|(column, value, timestamp)| json!([column, value, timestamp]))
            .collect();
        json!({ "rowName": self.name, "columns": columns })
    }
}

/// Rows of one dataset plus its commit flag.
#[derive(Debug, Default)]
struct StubDataset {
    /// Set once the dataset is committed; queries see rows only then.
    committed: bool,
    /// Recorded rows.
    rows: Vec<StubRow>,
}

/// Everything the stub has been told so far.
#[derive(Debug, Default)]
struct StubState {
    /// Datasets by id.
    datasets: BTreeMap<String, StubDataset>,
    /// Function configs by id.
    functions: BTreeMap<String, Value>,
    /// Procedure configs by id.
    procedures: BTreeMap<String, Value>,
    /// Training filter per model file URL written by `classifier.train`.
    models: BTreeMap<String, RowFilter>,
    /// Procedure runs so far; feeds run ids.
    runs: u64,
    /// `METHOD url` line per request.
    requests: Vec<String>,
}

/// Handle for the stub MLDB server.
pub struct MldbStubHandle {
    /// `http://host:port` of the listener.
    base_url: String,
    /// Shared server, unblocked on drop.
    server: Arc<Server>,
    /// State shared with the serving thread.
    state: Arc<Mutex<StubState>>,
    /// Serving thread.
    join: Option<thread::JoinHandle<()>>,
}

impl MldbStubHandle {
    /// Returns the stub base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns `METHOD url` lines for every request served so far.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().map_or_else(|_| Vec::new(), |state| state.requests.clone())
    }

    /// Returns the ids of every dataset, committed or not.
    pub fn dataset_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .map_or_else(|_| Vec::new(), |state| state.datasets.keys().cloned().collect())
    }
}

impl Drop for MldbStubHandle {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Starts the stub on an ephemeral loopback port.
pub fn spawn_mldb_stub() -> Result<MldbStubHandle, String> {
    let server = Server::http("127.0.0.1:0").map_err(|err| format!("stub bind failed: {err}"))?;
    let addr = server.server_addr().to_ip().ok_or_else(|| "stub has no ip address".to_string())?;
    let server = Arc::new(server);
    let state = Arc::new(Mutex::new(StubState::default()));
    let join = {
        let server = Arc::clone(&server);
        let state = Arc::clone(&state);
        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let (status, body) = handle_request(&state, &mut request);
                let mut response = Response::from_string(body.to_string()).with_status_code(status);
                if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
                    response = response.with_header(header);
                }
                let _ = request.respond(response);
            }
        })
    };
    Ok(MldbStubHandle {
        base_url: format!("http://{addr}"),
        server,
        state,
        join: Some(join),
    })
}

// ============================================================================
// SECTION: Routing
// ============================================================================

/// Routes one request to the matching stub operation.
fn handle_request(state: &Mutex<StubState>, request: &mut Request) -> Reply {
    let mut body = String::new();
    if request.as_reader().read_to_string(&mut body).is_err() {
        return (400, error_body("request body must be UTF-8"));
    }
    let method = request.method().to_string();
    let raw_url = request.url().to_string();
    let url = match Url::parse(&format!("http://stub{raw_url}")) {
        Ok(url) => url,
        Err(err) => return (400, error_body(&format!("invalid request url: {err}"))),
    };
    let segments = match path_segments(&url) {
        Ok(segments) => segments,
        Err(message) => return (400, error_body(&message)),
    };
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    let Ok(mut state) = state.lock() else {
        return (500, error_body("stub state poisoned"));
    };
    state.requests.push(format!("{method} {raw_url}"));
    let payload = if body.trim().is_empty() {
        Value::Null
    } else {
        match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(err) => return (400, error_body(&format!("invalid JSON body: {err}"))),
        }
    };

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["v1", "ping"]) => (200, json!("pong")),
        ("PUT", ["v1", "datasets", id]) => state.create_dataset(id, &payload),
        ("POST", ["v1", "datasets", id, "multirows"]) => state.record_rows(id, &payload),
        ("POST", ["v1", "datasets", id, "commit"]) => state.commit(id),
        ("PUT", ["v1", "functions", id]) => put_resource(&mut state.functions, id, payload),
        ("PUT", ["v1", "procedures", id]) => put_resource(&mut state.procedures, id, payload),
        ("POST", ["v1", "procedures", id, "runs"]) => state.run_procedure(id),
        ("GET", ["v1", "query"]) => {
            let sql = url.query_pairs().find(|(key, _)| key == "q").map(|(_, sql)| sql.into_owned());
            match sql {
                Some(sql) => {
                    match parse_statement(&sql).and_then(|statement| state.evaluate(&statement)) {
                        Ok(rows) => (200, Value::Array(rows.iter().map(StubRow::to_json).collect())),
                        Err(message) => (400, error_body(&message)),
                    }
                }
                None => (400, error_body("query requires a q parameter")),
            }
        }
        _ => (404, error_body(&format!("no route for {method} {}", url.path()))),
    }
}

/// Percent-decodes the non-empty path segments of `url`.
fn path_segments(url: &Url) -> Result<Vec<String>, String> {
    url.path_segments()
        .into_iter()
        .flatten()
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            percent_decode_str(segment)
                .decode_utf8()
                .map(Cow::into_owned)
                .map_err(|err| format!("path segment is not UTF-8: {err}"))
        })
        .collect()
}

/// Wraps `message` in the error body shape the client parses.
fn error_body(message: &str) -> Value {
    json!({ "error": message })
}

/// Message for a dataset id the stub has never seen.
fn unknown_dataset(id: &str) -> String {
    format!("dataset '{id}' not found")
}

/// Stores a function or procedure config, replacing any previous one.
fn put_resource(collection: &mut BTreeMap<String, Value>, id: &str, payload: Value) -> Reply {
    let Some(kind) = payload.get("type").and_then(Value::as_str) else {
        return (400, error_body("resource config requires a type"));
    };
    if !FUNCTION_TYPES.contains(&kind) && !PROCEDURE_TYPES.contains(&kind) {
        return (400, error_body(&format!("unknown resource type '{kind}'")));
    }
    let reply = json!({ "id": id, "type": kind });
    collection.insert(id.to_string(), payload);
    (201, reply)
}

// ============================================================================
// SECTION: Datasets
// ============================================================================

impl StubState {
    /// Creates an empty `sparse.mutable` dataset; existing ids conflict.
    fn create_dataset(&mut self, id: &str, payload: &Value) -> Reply {
        if self.datasets.contains_key(id) {
            return (409, error_body(&format!("dataset entry '{id}' already exists")));
        }
        match payload.get("type").and_then(Value::as_str) {
            Some("sparse.mutable") => {
                self.datasets.insert(id.to_string(), StubDataset::default());
                (201, json!({ "id": id, "type": "sparse.mutable" }))
            }
            Some(other) => (400, error_body(&format!("unsupported dataset type '{other}'"))),
            None => (400, error_body("dataset config requires a type")),
        }
    }

    /// Appends a multirows batch to an uncommitted dataset.
    fn record_rows(&mut self, id: &str, payload: &Value) -> Reply {
        let Some(dataset) = self.datasets.get_mut(id) else {
            return (404, error_body(&unknown_dataset(id)));
        };
        if dataset.committed {
            return (400, error_body(&format!("dataset '{id}' is already committed")));
        }
        let Some(rows) = payload.as_array() else {
            return (400, error_body("multirows body must be an array"));
        };
        let Some(rows) = rows.iter().map(decode_row).collect::<Option<Vec<_>>>() else {
            return (400, error_body("rows must be [rowName, [[column, value, timestamp]]]"));
        };
        dataset.rows.extend(rows);
        (200, Value::Null)
    }

    /// Marks a dataset committed.
    fn commit(&mut self, id: &str) -> Reply {
        let Some(dataset) = self.datasets.get_mut(id) else {
            return (404, error_body(&unknown_dataset(id)));
        };
        dataset.committed = true;
        (200, Value::Null)
    }

    /// Creates a committed dataset holding `rows`.
    fn materialize(&mut self, id: &str, rows: Vec<StubRow>) -> Result<usize, String> {
        if self.datasets.contains_key(id) {
            return Err(format!("dataset entry '{id}' already exists"));
        }
        let count = rows.len();
        self.datasets.insert(
            id.to_string(),
            StubDataset {
                committed: true,
                rows,
            },
        );
        Ok(count)
    }

    /// Returns committed rows of `id` that pass `filter`.
    fn visible_rows(&self, id: &str, filter: &RowFilter) -> Result<Vec<&StubRow>, String> {
        let dataset = self.datasets.get(id).ok_or_else(|| unknown_dataset(id))?;
        if !dataset.committed {
            return Ok(Vec::new());
        }
        Ok(dataset.rows.iter().filter(|row| filter.matches(row)).collect())
    }
}

/// Decodes one `[rowName, [[column, value, timestamp]]]` entry.
fn decode_row(row: &Value) -> Option<StubRow> {
    let [name, cells] = row.as_array()?.as_slice() else {
        return None;
    };
    let cells = cells
        .as_array()?
        .iter()
        .map(|cell| match cell.as_array()?.as_slice() {
            [column, value, timestamp] => {
                Some((column.as_str()?.to_string(), value.clone(), timestamp.clone()))
            }
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(StubRow {
        name: name.as_str()?.to_string(),
        cells,
    })
}

// ============================================================================
// SECTION: Procedures
// ============================================================================

impl StubState {
    /// Runs a stored procedure and reports its status.
    fn run_procedure(&mut self, id: &str) -> Reply {
        let Some(config) = self.procedures.get(id).cloned() else {
            return (404, error_body(&format!("procedure '{id}' not found")));
        };
        let params = config.get("params").cloned().unwrap_or(Value::Null);
        let outcome = match config.get("type").and_then(Value::as_str) {
            Some("transform") => self.run_transform(&params),
            Some("classifier.train") => self.run_train(&params),
            Some("classifier.test") => self.run_test(&params),
            _ => Err(format!("procedure '{id}' cannot be run")),
        };
        match outcome {
            Ok(status) => {
                self.runs += 1;
                let run_id = format!("run-{}", self.runs);
                (201, json!({ "id": run_id, "state": "finished", "status": status }))
            }
            Err(message) => (400, error_body(&message)),
        }
    }

    /// Materializes a transform's output dataset.
    fn run_transform(&mut self, params: &Value) -> Result<Value, String> {
        let statement = input_statement(params.get("inputData"))?;
        let output = output_id(params)?;
        let rows: Vec<StubRow> = match self.hasher_bits(&statement.select) {
            Some(bits) => self
                .visible_rows(&statement.from, &statement.filter)?
                .into_iter()
                .map(|row| hash_features(row, bits))
                .collect(),
            None => self.evaluate(&statement)?,
        };
        let count = self.materialize(&output, rows)?;
        Ok(json!({ "rowCount": count }))
    }

    /// Records the model file written by `classifier.train`.
    fn run_train(&mut self, params: &Value) -> Result<Value, String> {
        let statement = input_statement(params.get("trainingData"))?;
        let rows = self.visible_rows(&statement.from, &statement.filter)?.len();
        if rows == 0 {
            return Err("training data is empty".to_string());
        }
        let model = params
            .get("modelFileUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| "classifier.train requires modelFileUrl".to_string())?;
        self.models.insert(model.to_string(), statement.filter);
        Ok(json!({ "trainingRows": rows, "modelFileUrl": model }))
    }

    /// Scores the testing rows and reports their AUC.
    fn run_test(&mut self, params: &Value) -> Result<Value, String> {
        let statement = input_statement(params.get("testingData"))?;
        let scorer = self
            .functions
            .iter()
            .find(|(id, config)| {
                config.get("type").and_then(Value::as_str) == Some(CLASSIFIER)
                    && statement.select.contains(&format!("{id}("))
            })
            .ok_or_else(|| "testingData does not call a classifier function".to_string())?;
        let model = scorer.1["params"]["modelFileUrl"].as_str().unwrap_or_default();
        let Some(trained_on) = self.models.get(model) else {
            return Err(format!("model file '{model}' does not exist"));
        };
        let testing = self.visible_rows(&statement.from, &statement.filter)?;
        if let Some(row) = testing.iter().find(|row| trained_on.matches(row)) {
            return Err(format!("testing row '{}' was used for training", row.name));
        }

        let scored: Vec<StubRow> = testing
            .into_iter()
            .map(|row| {
                let label = row.value(LABEL_COLUMN) == Some(&json!("true"));
                StubRow {
                    name: row.name.clone(),
                    cells: vec![
                        ("label".to_string(), json!(label), json!("-Inf")),
                        ("score".to_string(), json!(score(&row.name)), json!("-Inf")),
                    ],
                }
            })
            .collect();
        let auc = area_under_curve(&scored)?;
        let output = output_id(params)?;
        let count = self.materialize(&output, scored)?;
        Ok(json!({ "auc": auc, "testRows": count }))
    }

    /// Returns the bucket width when `select` calls a hashed-column function.
    fn hasher_bits(&self, select: &str) -> Option<u32> {
        self.functions.iter().find_map(|(id, config)| {
            let is_hasher = config.get("type").and_then(Value::as_str) == Some(HASHED_COLUMN);
            if !is_hasher || !select.contains(&format!("{id}(")) {
                return None;
            }
            let bits = config["params"]["numBits"].as_u64().unwrap_or(8);
            u32::try_from(bits.min(32)).ok()
        })
    }
}

/// Reads `outputDataset` as an id string or `{ "id": ... }`.
fn output_id(params: &Value) -> Result<String, String> {
    let output = params.get("outputDataset");
    output
        .and_then(|value| value.get("id").or(Some(value)))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "procedure requires outputDataset.id".to_string())
}

/// Counts non-label columns into `features.hashColumn{bucket}` cells.
fn hash_features(row: &StubRow, bits: u32) -> StubRow {
    let mask = (1_u64 << bits) - 1;
    let mut buckets: BTreeMap<u64, u64> = BTreeMap::new();
    for (column, _, _) in row.cells.iter().filter(|(column, _, _)| column != LABEL_COLUMN) {
        *buckets.entry(row_hash(column) & mask).or_default() += 1;
    }
    let mut cells: Vec<(String, Value, Value)> = buckets
        .into_iter()
        .map(|(bucket, count)| (format!("features.hashColumn{bucket}"), json!(count), json!("-Inf")))
        .collect();
    if let Some(label) = row.value(LABEL_COLUMN) {
        cells.push((LABEL_COLUMN.to_string(), label.clone(), json!("-Inf")));
    }
    StubRow {
        name: row.name.clone(),
        cells,
    }
}

/// Deterministic pseudo-score in `[0, 1)`.
fn score(row_name: &str) -> f64 {
    let bucket = u32::try_from(row_hash(row_name) % 10_000).unwrap_or_default();
    f64::from(bucket) / 10_000.0
}

/// Fraction of positive/negative pairs ranked correctly; ties count half.
fn area_under_curve(scored: &[StubRow]) -> Result<f64, String> {
    let mut positives = Vec::new();
    let mut negatives = Vec::new();
    for row in scored {
        let score = row.value("score").and_then(Value::as_f64).unwrap_or_default();
        if row.value("label") == Some(&json!(true)) {
            positives.push(score);
        } else {
            negatives.push(score);
        }
    }
    if positives.is_empty() || negatives.is_empty() {
        return Err("testing data must contain both labels".to_string());
    }
    let mut correct = 0.0;
    let mut pairs = 0.0;
    for positive in &positives {
        for negative in &negatives {
            pairs += 1.0;
            if positive > negative {
                correct += 1.0;
            } else if (positive - negative).abs() < f64::EPSILON {
                correct += 0.5;
            }
        }
    }
    Ok(correct / pairs)
}

/// First eight bytes of the SHA-256 of `name`, big-endian.
fn row_hash(name: &str) -> u64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Shape of a select list.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Projection {
    /// `*`.
    All,
    /// `* NAMED expr`.
    Named(String),
    /// `pivot(column, value) as *`.
    Pivot {
        /// Column whose value names the output column.
        column: String,
        /// Column holding the output value.
        value: String,
    },
    /// `count(*)`.
    Count,
    /// Anything else; only procedures accept it.
    Other,
}

/// Supported `where` clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RowFilter {
    /// No clause.
    All,
    /// `rowHash() % modulus = remainder` or `!=`.
    RowHash {
        /// Divisor.
        modulus: u64,
        /// Expected remainder.
        remainder: u64,
        /// `true` for `=`, `false` for `!=`.
        equal: bool,
    },
    /// `column IS NOT NULL`.
    NotNull(String),
}

impl RowFilter {
    /// Returns whether `row` passes the clause.
    fn matches(&self, row: &StubRow) -> bool {
        match self {
            Self::All => true,
            Self::RowHash {
                modulus,
                remainder,
                equal,
            } => (row_hash(&row.name) % modulus == *remainder) == *equal,
            Self::NotNull(column) => row.value(column).is_some_and(|value| !value.is_null()),
        }
    }
}

/// Parsed select statement.
#[derive(Debug, Clone)]
struct Statement {
    /// Raw select list.
    select: String,
    /// Classified select list.
    projection: Projection,
    /// Source dataset id.
    from: String,
    /// Row filter.
    filter: RowFilter,
    /// `group by` column.
    group_by: Option<String>,
}

/// Error message for SQL outside the supported shapes.
fn unsupported(text: &str) -> String {
    format!("unsupported statement: {text}")
}

/// Strips a leading ASCII keyword, ignoring case.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    head.eq_ignore_ascii_case(keyword).then(|| text[keyword.len()..].trim_start())
}

/// Parses `select ... from ds [where ...] [group by col]`.
fn parse_statement(sql: &str) -> Result<Statement, String> {
    let text = sql.trim();
    let lower = text.to_ascii_lowercase();
    let body = strip_keyword(text, "select ").ok_or_else(|| unsupported(text))?;
    let start = text.len() - body.len();
    let from_at =
        lower[start..].find(" from ").map(|at| at + start).ok_or_else(|| unsupported(text))?;
    let select = text[start..from_at].trim();

    let tail = text[from_at + " from ".len()..].trim_start();
    let from_end = tail.find(char::is_whitespace).unwrap_or(tail.len());
    let from = tail[..from_end].trim_matches('"').to_string();
    let rest = tail[from_end..].trim();

    let (condition, group_by) = match rest.to_ascii_lowercase().find("group by") {
        Some(at) => (rest[..at].trim(), Some(rest[at + "group by".len()..].trim().to_string())),
        None => (rest, None),
    };
    let filter = if condition.is_empty() {
        RowFilter::All
    } else {
        let condition = strip_keyword(condition, "where").ok_or_else(|| unsupported(text))?;
        parse_filter(condition)?
    };
    Ok(Statement {
        select: select.to_string(),
        projection: parse_projection(select),
        from,
        filter,
        group_by,
    })
}

/// Classifies a select list.
fn parse_projection(select: &str) -> Projection {
    if select == "*" {
        return Projection::All;
    }
    if select.eq_ignore_ascii_case("count(*)") {
        return Projection::Count;
    }
    if let Some(named) = strip_keyword(select, "*").and_then(|rest| strip_keyword(rest, "named"))
    {
        return Projection::Named(named.trim().to_string());
    }
    let pivot = strip_keyword(select, "pivot(")
        .and_then(|rest| rest.split_once(')'))
        .and_then(|(args, _)| args.split_once(','));
    if let Some((column, value)) = pivot {
        return Projection::Pivot {
            column: column.trim().to_string(),
            value: value.trim().to_string(),
        };
    }
    Projection::Other
}

/// Parses the text after `where`.
fn parse_filter(condition: &str) -> Result<RowFilter, String> {
    let invalid = || format!("unsupported where clause: {condition}");
    if let Some(rest) = strip_keyword(condition, "rowHash()") {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let ["%", modulus, op, remainder] = tokens.as_slice() else {
            return Err(invalid());
        };
        let modulus: u64 = modulus.parse().map_err(|_| invalid())?;
        let remainder: u64 = remainder.parse().map_err(|_| invalid())?;
        if modulus == 0 {
            return Err("rowHash() modulus must be positive".to_string());
        }
        let equal = match *op {
            "=" => true,
            "!=" => false,
            _ => return Err(invalid()),
        };
        return Ok(RowFilter::RowHash {
            modulus,
            remainder,
            equal,
        });
    }
    let tokens: Vec<&str> = condition.split_whitespace().collect();
    match tokens.as_slice() {
        [column, is, not, null]
            if is.eq_ignore_ascii_case("is")
                && not.eq_ignore_ascii_case("not")
                && null.eq_ignore_ascii_case("null") =>
        {
            Ok(RowFilter::NotNull((*column).to_string()))
        }
        _ => Err(invalid()),
    }
}

/// Reads `inputData`-style values: SQL text or a structured select.
fn input_statement(input: Option<&Value>) -> Result<Statement, String> {
    match input {
        Some(Value::String(sql)) => parse_statement(sql),
        Some(Value::Object(fields)) => {
            let select = fields.get("select").and_then(Value::as_str).unwrap_or("*");
            let from = fields
                .get("from")
                .and_then(|from| from.get("id").or(Some(from)))
                .and_then(Value::as_str)
                .ok_or_else(|| "input data requires from.id".to_string())?;
            let filter = match fields.get("where").and_then(Value::as_str) {
                Some(condition) => parse_filter(condition)?,
                None => RowFilter::All,
            };
            Ok(Statement {
                select: select.to_string(),
                projection: parse_projection(select),
                from: from.to_string(),
                filter,
                group_by: None,
            })
        }
        _ => Err("procedure requires input data".to_string()),
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

impl StubState {
    /// Runs a statement against committed rows.
    fn evaluate(&self, statement: &Statement) -> Result<Vec<StubRow>, String> {
        let rows = self.visible_rows(&statement.from, &statement.filter)?;
        match (&statement.projection, statement.group_by.as_deref()) {
            (Projection::All, None) => Ok(rows.into_iter().cloned().collect()),
            (Projection::Named(expression), None) => name_rows(&rows, expression),
            (Projection::Pivot { column, value }, Some(key)) => Ok(group_rows(&rows, key)
                .into_iter()
                .map(|(name, members)| StubRow {
                    name,
                    cells: members
                        .iter()
                        .filter_map(|row| pivot_cell(row, column, value))
                        .collect(),
                })
                .collect()),
            (Projection::Count, Some(key)) => Ok(group_rows(&rows, key)
                .into_iter()
                .map(|(name, members)| count_row(name, members.len()))
                .collect()),
            (Projection::Count, None) => Ok(vec![count_row("[]".to_string(), rows.len())]),
            _ => Err(unsupported(&statement.select)),
        }
    }
}

/// Renames rows by a `NAMED` expression: a quoted literal or a column.
fn name_rows(rows: &[&StubRow], expression: &str) -> Result<Vec<StubRow>, String> {
    if expression.starts_with('{') {
        return Err("NAMED expression must evaluate to a single value".to_string());
    }
    if let Some(literal) = expression.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) {
        if literal.is_empty() {
            return Err("Can't create a row with an empty name.".to_string());
        }
        return Ok(rows
            .iter()
            .map(|row| StubRow {
                name: literal.to_string(),
                cells: row.cells.clone(),
            })
            .collect());
    }
    rows.iter()
        .map(|row| {
            let name = match row.value(expression) {
                Some(Value::String(name)) if !name.is_empty() => name.clone(),
                Some(Value::Number(number)) => number.to_string(),
                _ => return Err("Can't create a row with a null or empty name.".to_string()),
            };
            Ok(StubRow {
                name,
                cells: row.cells.clone(),
            })
        })
        .collect()
}

/// Groups rows by the JSON-array encoding of their `key` value.
fn group_rows<'a>(rows: &[&'a StubRow], key: &str) -> BTreeMap<String, Vec<&'a StubRow>> {
    let mut groups: BTreeMap<String, Vec<&StubRow>> = BTreeMap::new();
    for row in rows.iter().copied() {
        let value = row.value(key).cloned().unwrap_or(Value::Null);
        groups.entry(json!([value]).to_string()).or_default().push(row);
    }
    groups
}

/// Cell named by `column`'s value and holding `value`'s value.
fn pivot_cell(row: &StubRow, column: &str, value: &str) -> Option<(String, Value, Value)> {
    let name = match row.value(column)? {
        Value::String(name) => name.clone(),
        other => other.to_string(),
    };
    let (_, cell, timestamp) = row.cells.iter().rev().find(|(name, _, _)| name == value)?;
    Some((name, cell.clone(), timestamp.clone()))
}

/// Single-cell `count(*)` row.
fn count_row(name: String, count: usize) -> StubRow {
    StubRow {
        name,
        cells: vec![("count(*)".to_string(), json!(count), json!("-Inf"))],
    }
}
