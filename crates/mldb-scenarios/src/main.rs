// crates/mldb-scenarios/src/main.rs
// ============================================================================
// Module: MLDB Scenarios CLI Entry Point
// Description: Command dispatcher for running scenarios against a service.
// Purpose: Run one or all scenarios and report a success marker per scenario.
// Dependencies: clap, mldb-client, mldb-scenarios
// ============================================================================

//! ## Overview
//! `mldb-scenarios run <name|all>` builds a client from configuration, runs
//! the selected scenarios in order and prints `<name>\tsuccess` for each one
//! that passes. The first failure stops the run with a non-zero exit code.
//! `mldb-scenarios list` prints the available scenarios.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use mldb_client::ClientConfig;
use mldb_client::MldbClient;
use mldb_client::wait_for_ready;
use mldb_scenarios::ScenarioKind;
use mldb_scenarios::ScenarioSettings;
use mldb_scenarios::run_scenario;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "mldb-scenarios", version, disable_help_subcommand = true)]
struct Cli {
    /// Client configuration file (overrides `MLDB_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Service base URL (overrides `MLDB_URL` and the config file).
    #[arg(long, value_name = "URL", global = true)]
    url: Option<String>,
    /// Seed for example token sampling.
    #[arg(long, value_name = "N", global = true)]
    seed: Option<u64>,
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one scenario, or all of them in order.
    Run {
        /// Scenario to run.
        #[arg(value_enum)]
        scenario: ScenarioArg,
        /// Wait up to this many milliseconds for the service to answer pings.
        #[arg(long, value_name = "MS")]
        ready_timeout_ms: Option<u64>,
    },
    /// List the available scenarios.
    List,
}

/// Scenario selector accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ScenarioArg {
    /// Feature hashing and classifier training.
    ClassifierTraining,
    /// Pivot transform and non-ASCII group-by.
    PivotTransform,
    /// `NAMED` expression error messages.
    NamedRows,
    /// Every scenario in order.
    All,
}

impl ScenarioArg {
    /// Expands the selector into scenarios.
    fn targets(self) -> Vec<ScenarioKind> {
        match self {
            Self::ClassifierTraining => vec![ScenarioKind::ClassifierTraining],
            Self::PivotTransform => vec![ScenarioKind::PivotTransform],
            Self::NamedRows => vec![ScenarioKind::NamedRows],
            Self::All => ScenarioKind::ALL.to_vec(),
        }
    }
}

/// CLI error wrapper.
#[derive(Debug)]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => emit_error(&err.message),
    }
}

/// Executes the command dispatcher.
fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::List => command_list(),
        Commands::Run {
            scenario,
            ready_timeout_ms,
        } => {
            let config = load_config(cli.config.as_deref(), cli.url.as_deref())?;
            let settings = build_settings(cli.seed);
            command_run(&config, &settings, scenario, ready_timeout_ms)
        }
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `list` command.
fn command_list() -> CliResult<ExitCode> {
    for kind in ScenarioKind::ALL {
        write_stdout_line(&format!("{kind}\t{}", kind.description()))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `run` command.
fn command_run(
    config: &ClientConfig,
    settings: &ScenarioSettings,
    scenario: ScenarioArg,
    ready_timeout_ms: Option<u64>,
) -> CliResult<ExitCode> {
    let client = MldbClient::new(config).map_err(|err| CliError::new(err.to_string()))?;
    if let Some(timeout_ms) = ready_timeout_ms {
        wait_for_ready(&client, Duration::from_millis(timeout_ms))
            .map_err(|err| CliError::new(err.to_string()))?;
    }
    for kind in scenario.targets() {
        let report = run_scenario(kind, &client, settings)
            .map_err(|err| CliError::new(format!("{kind}: {err}")))?;
        write_stdout_line(&format!("{}\t{}", report.scenario, report.outcome))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads client configuration and applies the `--url` override.
fn load_config(path: Option<&Path>, url: Option<&str>) -> CliResult<ClientConfig> {
    let mut config = ClientConfig::load(path).map_err(|err| CliError::new(err.to_string()))?;
    if let Some(url) = url {
        config.base_url = url.trim().to_string();
        config.validate().map_err(|err| CliError::new(err.to_string()))?;
    }
    Ok(config)
}

/// Builds scenario settings from defaults and the `--seed` override.
fn build_settings(seed: Option<u64>) -> ScenarioSettings {
    let mut settings = ScenarioSettings::default();
    if let Some(seed) = seed {
        settings.seed = seed;
    }
    settings
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "error: {message}");
    ExitCode::FAILURE
}
