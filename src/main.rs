use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use testflow::actions::builtin_registry;
use testflow::limits::{validate_limits, ExecutionLimits};
use testflow::telemetry::{self, TelemetryConfig};
use testflow::{Runner, ValidationError};

#[derive(Parser)]
#[command(name = "testflow")]
#[command(about = "Declarative scenario/step test runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validates and executes a test file, printing the JSON report
    Run {
        /// Path to the test document
        #[arg(short, long)]
        file: PathBuf,

        /// Execute even if arity validation fails
        #[arg(long)]
        skip_validation: bool,

        /// Execution limits profile
        #[arg(long, value_enum, default_value_t = LimitsProfile::Off)]
        limits: LimitsProfile,
    },
    /// Loads and validates a test file without executing it
    Validate {
        /// Path to the test document
        #[arg(short, long)]
        file: PathBuf,

        /// Execution limits profile
        #[arg(long, value_enum, default_value_t = LimitsProfile::Off)]
        limits: LimitsProfile,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LimitsProfile {
    /// No limits check
    Off,
    /// Defaults overridden by TESTFLOW_MAX_* variables
    Env,
    Strict,
    Relaxed,
}

impl LimitsProfile {
    fn resolve(self) -> Option<ExecutionLimits> {
        match self {
            Self::Off => None,
            Self::Env => Some(ExecutionLimits::from_env()),
            Self::Strict => Some(ExecutionLimits::strict()),
            Self::Relaxed => Some(ExecutionLimits::relaxed()),
        }
    }
}

/// Exit code when loading, limits or validation fail.
const EXIT_INVALID: i32 = 1;
/// Exit code when the run finished with failed dispatches.
const EXIT_DISPATCH_FAILED: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init_telemetry(TelemetryConfig::from_env()) {
        eprintln!("❌ Failed to initialise telemetry: {:#}", e);
    }

    let outcome = match cli.command {
        Commands::Run {
            file,
            skip_validation,
            limits,
        } => run(&file, skip_validation, limits.resolve()).await,
        Commands::Validate { file, limits } => validate(&file, limits.resolve()),
    };

    telemetry::shutdown_telemetry();

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ {:#}", e);
            std::process::exit(EXIT_INVALID);
        }
    }
}

/// Loads the test, checks limits when a profile is given and imports the
/// built-in actions.
fn prepare(file: &Path, limits: Option<&ExecutionLimits>) -> Result<Runner> {
    let mut runner = match Runner::new(file) {
        Ok(runner) => runner,
        Err(e) => {
            error!(code = %e.code(), "{}", e);
            return Err(e).with_context(|| format!("Failed to load test {:?}", file));
        }
    };
    info!(test = %runner.spec().name, scenarios = runner.spec().scenarios.len(), "📋 Test loaded");

    if let Some(limits) = limits {
        let check = validate_limits(runner.spec(), limits);
        if !check.passed {
            for violation in &check.violations {
                error!(code = %violation.code, limit = %violation.limit_name, "{}", violation.message);
            }
            bail!(
                "Test exceeds execution limits ({} violation(s))",
                check.violations.len()
            );
        }
    }

    runner.import_actions(builtin_registry());
    Ok(runner)
}

fn check_arity(runner: &Runner) -> Result<()> {
    runner.try_validate().map_err(|e: ValidationError| {
        error!(code = %e.code(), "{}", e);
        anyhow::Error::new(e).context("Test validation failed")
    })
}

fn validate(file: &Path, limits: Option<ExecutionLimits>) -> Result<i32> {
    let runner = prepare(file, limits.as_ref())?;
    check_arity(&runner)?;
    info!("✅ Test is valid");
    Ok(0)
}

async fn run(file: &Path, skip_validation: bool, limits: Option<ExecutionLimits>) -> Result<i32> {
    let runner = prepare(file, limits.as_ref())?;

    if skip_validation {
        info!("Validation skipped");
    } else {
        check_arity(&runner)?;
    }

    let report = runner.execute().await;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);

    Ok(if report.passed() {
        0
    } else {
        EXIT_DISPATCH_FAILED
    })
}
