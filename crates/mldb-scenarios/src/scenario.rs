// crates/mldb-scenarios/src/scenario.rs
// ============================================================================
// Module: Scenario Runtime
// Description: Scenario identity, settings, errors, and execution context.
// Purpose: Share the plumbing every pipeline needs: logging, metrics, reports.
// Dependencies: mldb-client, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`run_scenario`] builds a [`ScenarioContext`] around an injected client,
//! runs one pipeline to completion and returns a [`ScenarioReport`]. The
//! context routes progress messages through the client's log sink and
//! collects the metrics a pipeline chooses to publish (for example the AUC
//! reported by a classifier test).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use mldb_client::MessageLogEvent;
use mldb_client::MldbClient;
use mldb_client::MldbError;
use mldb_client::PerformResult;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::classifier;
use crate::named_rows;
use crate::pivot;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default RNG seed for token sampling.
pub const DEFAULT_SEED: u64 = 0x4d4c_4442;
/// Default number of labeled examples ingested by the classifier pipeline.
pub const DEFAULT_EXAMPLE_COUNT: usize = 200;
/// Default number of sampled tokens per example row.
pub const DEFAULT_TOKENS_PER_ROW: usize = 25;
/// Default bit width of the hashed feature space.
pub const DEFAULT_HASH_BITS: u32 = 5;
/// Default location of the trained model.
pub const DEFAULT_MODEL_URL: &str = "file://models/tng.cls";

// ============================================================================
// SECTION: Scenario Identity
// ============================================================================

/// Available scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    /// Feature hashing, classifier training, and classifier testing.
    ClassifierTraining,
    /// Pivot transform and non-ASCII group-by row naming.
    PivotTransform,
    /// Error messages for invalid `NAMED` row expressions.
    NamedRows,
}

impl ScenarioKind {
    /// Every scenario in execution order.
    pub const ALL: [Self; 3] = [Self::ClassifierTraining, Self::PivotTransform, Self::NamedRows];

    /// Returns the canonical scenario name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClassifierTraining => "classifier-training",
            Self::PivotTransform => "pivot-transform",
            Self::NamedRows => "named-rows",
        }
    }

    /// Returns a one-line description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ClassifierTraining => {
                "hashed features, glz classifier training and AUC evaluation"
            }
            Self::PivotTransform => "pivot transform and non-ASCII group-by row names",
            Self::NamedRows => "error messages for null, empty and non-scalar NAMED expressions",
        }
    }

    /// Parses a canonical scenario name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Tunable scenario parameters.
///
/// # Invariants
/// - `example_count` and `tokens_per_row` are non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioSettings {
    /// Seed for token sampling; a fixed seed makes ingestion reproducible.
    pub seed: u64,
    /// Labeled examples ingested by the classifier pipeline.
    pub example_count: usize,
    /// Sampled tokens per example row.
    pub tokens_per_row: usize,
    /// Bit width of the hashed feature space.
    pub hash_bits: u32,
    /// Model location handed to the trainer and the scorer.
    pub model_url: String,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            example_count: DEFAULT_EXAMPLE_COUNT,
            tokens_per_row: DEFAULT_TOKENS_PER_ROW,
            hash_bits: DEFAULT_HASH_BITS,
            model_url: DEFAULT_MODEL_URL.to_string(),
        }
    }
}

impl ScenarioSettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Assertion`] when a count is zero or the model
    /// URL is empty.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.example_count == 0 {
            return Err(ScenarioError::Assertion("example_count must be non-zero".to_string()));
        }
        if self.tokens_per_row == 0 {
            return Err(ScenarioError::Assertion("tokens_per_row must be non-zero".to_string()));
        }
        if self.model_url.trim().is_empty() {
            return Err(ScenarioError::Assertion("model_url must not be empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors and Outcomes
// ============================================================================

/// Scenario failures.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// A remote call failed or was rejected.
    #[error(transparent)]
    Client(#[from] MldbError),
    /// An expectation on the service's answer did not hold.
    #[error("assertion failed: {0}")]
    Assertion(String),
    /// The service answered with an unexpected shape.
    #[error("unexpected response shape: {0}")]
    Protocol(String),
}

/// Terminal scenario outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioOutcome {
    /// Every step passed.
    Success,
}

impl ScenarioOutcome {
    /// Returns the literal outcome marker.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
        }
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a completed scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    /// Scenario that ran.
    pub scenario: ScenarioKind,
    /// Terminal outcome.
    pub outcome: ScenarioOutcome,
    /// Metrics published by the pipeline.
    pub metrics: BTreeMap<String, Value>,
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Execution context handed to a pipeline.
pub struct ScenarioContext<'a> {
    /// Injected service client.
    client: &'a MldbClient,
    /// Scenario being run.
    kind: ScenarioKind,
    /// Scenario parameters.
    settings: &'a ScenarioSettings,
    /// Metrics collected so far.
    metrics: BTreeMap<String, Value>,
}

impl<'a> ScenarioContext<'a> {
    /// Creates a context for one scenario run.
    #[must_use]
    pub const fn new(
        client: &'a MldbClient,
        kind: ScenarioKind,
        settings: &'a ScenarioSettings,
    ) -> Self {
        Self {
            client,
            kind,
            settings,
            metrics: BTreeMap::new(),
        }
    }

    /// Returns the service client.
    #[must_use]
    pub const fn client(&self) -> &'a MldbClient {
        self.client
    }

    /// Returns the scenario parameters.
    #[must_use]
    pub const fn settings(&self) -> &'a ScenarioSettings {
        self.settings
    }

    /// Records a progress message.
    pub fn log(&self, message: &str) {
        self.emit(message, None);
    }

    /// Records a progress message with structured detail.
    pub fn log_detail(&self, message: &str, detail: Value) {
        self.emit(message, Some(detail));
    }

    /// Records the result of a remote call.
    pub fn log_result(&self, step: &str, result: &PerformResult) {
        let detail = serde_json::to_value(result).unwrap_or(Value::Null);
        self.emit(step, Some(detail));
    }

    /// Publishes a metric in the final report.
    pub fn record_metric(&mut self, key: &str, value: impl Into<Value>) {
        self.metrics.insert(key.to_string(), value.into());
    }

    /// Closes the context into a successful report.
    #[must_use]
    pub fn finish(self) -> ScenarioReport {
        ScenarioReport {
            scenario: self.kind,
            outcome: ScenarioOutcome::Success,
            metrics: self.metrics,
        }
    }

    /// Routes a message event through the client's log sink.
    fn emit(&self, message: &str, detail: Option<Value>) {
        let event = MessageLogEvent::new(self.kind.as_str(), message, detail);
        self.client.log_sink().record_message(&event);
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Runs one scenario to completion.
///
/// # Errors
///
/// Returns the first [`ScenarioError`] raised by the pipeline.
pub fn run_scenario(
    kind: ScenarioKind,
    client: &MldbClient,
    settings: &ScenarioSettings,
) -> Result<ScenarioReport, ScenarioError> {
    settings.validate()?;
    let mut ctx = ScenarioContext::new(client, kind, settings);
    match kind {
        ScenarioKind::ClassifierTraining => classifier::run(&mut ctx)?,
        ScenarioKind::PivotTransform => pivot::run(&mut ctx)?,
        ScenarioKind::NamedRows => named_rows::run(&mut ctx)?,
    }
    ctx.log(ScenarioOutcome::Success.as_str());
    Ok(ctx.finish())
}
