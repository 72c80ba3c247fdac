// crates/mldb-scenarios/src/classifier.rs
// ============================================================================
// Module: Classifier Training Scenario
// Description: Feature hashing, classifier training, and classifier testing.
// Purpose: Exercise the full ingest, transform, train, score pipeline.
// Dependencies: mldb-client, serde_json
// ============================================================================

//! ## Overview
//! Steps, each checked before the next:
//! 1. Ingest labeled token rows into `toy`.
//! 2. Register the `featHasher` hashed-column feature generator.
//! 3. Transform `toy` into `toy_feats` through the hasher.
//! 4. Train a `glz` classifier on the `rowHash() % 3 != 1` partition.
//! 5. Register the `tng_scorer` function over the trained model.
//! 6. Test the classifier on the `rowHash() % 3 = 1` partition and read the
//!    reported AUC.

// ============================================================================
// SECTION: Imports
// ============================================================================

use mldb_client::CellTimestamp;
use mldb_client::DatasetConfig;
use mldb_client::InputData;
use mldb_client::OutputDataset;
use mldb_client::ProcedureRun;
use mldb_client::ResourceConfig;
use mldb_client::SelectQuery;
use serde_json::json;

use crate::assertions::require_number;
use crate::assertions::require_ok;
use crate::corpus::ExampleGenerator;
use crate::corpus::example_row_name;
use crate::scenario::ScenarioContext;
use crate::scenario::ScenarioError;

// ============================================================================
// SECTION: Resource Identifiers
// ============================================================================

/// Raw example dataset.
pub const SOURCE_DATASET: &str = "toy";
/// Hashed feature dataset.
pub const FEATURE_DATASET: &str = "toy_feats";
/// Classifier test output dataset.
pub const SCORE_DATASET: &str = "toy_cls_baseline_scorer_rez";
/// Feature hashing function.
pub const HASHER_FUNCTION: &str = "featHasher";
/// Classifier scoring function.
pub const SCORER_FUNCTION: &str = "tng_scorer";
/// Feature transform procedure.
pub const FEATURE_PROCEDURE: &str = "toy_feats_creator";
/// Classifier training procedure.
pub const TRAIN_PROCEDURE: &str = "tng_classif";
/// Classifier test procedure.
pub const TEST_PROCEDURE: &str = "tng_score_proc";

/// Training partition filter.
pub const TRAIN_SPLIT: &str = "rowHash() % 3 != 1";
/// Held-out partition filter.
pub const TEST_SPLIT: &str = "rowHash() % 3 = 1";

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Runs the classifier training pipeline.
///
/// # Errors
///
/// Returns [`ScenarioError`] on the first failed step.
pub fn run(ctx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError> {
    let rows = ingest_examples(ctx)?;
    ctx.record_metric("examples", rows);
    register_hasher(ctx)?;
    build_features(ctx)?;
    train(ctx)?;
    let auc = evaluate(ctx)?;
    ctx.record_metric("auc", auc);
    Ok(())
}

/// Records the labeled examples and commits them.
fn ingest_examples(ctx: &ScenarioContext<'_>) -> Result<usize, ScenarioError> {
    let settings = ctx.settings();
    let mut dataset = ctx.client().create_dataset(&DatasetConfig::sparse_mutable(SOURCE_DATASET))?;
    ctx.log("data loader created dataset");

    let mut generator =
        ExampleGenerator::new(settings.seed, settings.tokens_per_row, CellTimestamp::now());
    for index in 0..settings.example_count {
        dataset.record_row(example_row_name(index), generator.example_cells(index))?;
    }

    ctx.log("Committing dataset");
    let receipt = dataset.commit()?;
    Ok(receipt.rows)
}

/// Registers the hashed-column feature generator.
fn register_hasher(ctx: &ScenarioContext<'_>) -> Result<(), ScenarioError> {
    let config = ResourceConfig::new(
        "experimental.feature_generator.hashed_column",
        json!({ "numBits": ctx.settings().hash_bits }),
    );
    let result = ctx.client().put_function(HASHER_FUNCTION, &config)?;
    ctx.log_result("feature hasher creation", &result);
    require_ok("register feature hasher", result)?;
    Ok(())
}

/// Materializes the hashed feature dataset.
fn build_features(ctx: &ScenarioContext<'_>) -> Result<(), ScenarioError> {
    let input: InputData = SelectQuery::new(
        format!("{{ {HASHER_FUNCTION}({{{{* EXCLUDING(LABEL)}} as columns}})[hash] }} as features, LABEL"),
        SOURCE_DATASET,
    )
    .into();
    let config = ResourceConfig::new(
        "transform",
        json!({
            "inputData": input,
            "outputDataset": OutputDataset::sparse_mutable(FEATURE_DATASET),
        }),
    );
    let result = ctx.client().put_procedure(FEATURE_PROCEDURE, &config)?;
    ctx.log_result("feature procedure creation", &result);
    require_ok("create feature procedure", result)?;

    let result = ctx.client().run_procedure(FEATURE_PROCEDURE)?;
    ctx.log_result("feature procedure run", &result);
    require_ok("run feature procedure", result)?;
    Ok(())
}

/// Trains the classifier on the training partition.
fn train(ctx: &ScenarioContext<'_>) -> Result<(), ScenarioError> {
    let training: InputData = SelectQuery::new(
        "{* EXCLUDING(LABEL)} as features, LABEL = 'true' as label",
        FEATURE_DATASET,
    )
    .filter(TRAIN_SPLIT)
    .into();
    let config = ResourceConfig::new(
        "classifier.train",
        json!({
            "trainingData": training,
            "configuration": {
                "glz": {
                    "type": "glz",
                    "verbosity": 3,
                    "normalize": true,
                    "ridge_regression": true
                }
            },
            "algorithm": "glz",
            "modelFileUrl": ctx.settings().model_url,
        }),
    );
    let result = ctx.client().put_procedure(TRAIN_PROCEDURE, &config)?;
    ctx.log_result("training procedure creation", &result);
    require_ok("create training procedure", result)?;

    let result = ctx.client().run_procedure(TRAIN_PROCEDURE)?;
    ctx.log_result("training procedure run", &result);
    require_ok("run training procedure", result)?;
    Ok(())
}

/// Registers the scorer, tests on the held-out partition and returns the AUC.
fn evaluate(ctx: &ScenarioContext<'_>) -> Result<f64, ScenarioError> {
    let scorer = ResourceConfig::new(
        "classifier",
        json!({ "modelFileUrl": ctx.settings().model_url }),
    );
    let result = ctx.client().put_function(SCORER_FUNCTION, &scorer)?;
    ctx.log_result("scorer creation", &result);
    require_ok("register scorer", result)?;

    let testing_data = format!(
        "select {{*}} as features, LABEL = 'true' as label, \
         {SCORER_FUNCTION}({{{{ * EXCLUDING(LABEL)}} as features}})[score] as score \
         from {FEATURE_DATASET} where {TEST_SPLIT}"
    );
    let config = ResourceConfig::new(
        "classifier.test",
        json!({
            "testingData": InputData::from(testing_data),
            "outputDataset": OutputDataset::sparse_mutable(SCORE_DATASET),
        }),
    );
    let result = ctx.client().put_procedure(TEST_PROCEDURE, &config)?;
    ctx.log_result("test procedure creation", &result);
    require_ok("create test procedure", result)?;

    let result = ctx.client().run_procedure(TEST_PROCEDURE)?;
    ctx.log_result("test procedure run", &result);
    let result = require_ok("run test procedure", result)?;
    let run = ProcedureRun::from_result(&result)?;
    let auc = require_number("read test auc", run.status.get("auc"))?;
    ctx.log_detail("classifier auc", json!(auc));
    Ok(auc)
}
