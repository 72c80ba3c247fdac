// crates/mldb-scenarios/src/lib.rs
// ============================================================================
// Module: MLDB Scenarios Library
// Description: End-to-end pipelines driven against an MLDB service.
// Purpose: Provide runnable, independently composable scenario pipelines.
// Dependencies: mldb-client, rand, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Each scenario is a linear pipeline of dependent remote calls. A step's
//! output (usually a created resource id) feeds the next step, every step is
//! checked before the pipeline moves on, and the first failure aborts the
//! scenario with a [`ScenarioError`].
//!
//! Scenarios receive an explicitly constructed [`mldb_client::MldbClient`];
//! there is no ambient service handle.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assertions;
pub mod classifier;
pub mod corpus;
pub mod named_rows;
pub mod pivot;
pub mod scenario;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use scenario::ScenarioContext;
pub use scenario::ScenarioError;
pub use scenario::ScenarioKind;
pub use scenario::ScenarioOutcome;
pub use scenario::ScenarioReport;
pub use scenario::ScenarioSettings;
pub use scenario::run_scenario;
