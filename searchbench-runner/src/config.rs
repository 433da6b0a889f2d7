use clap::Args;
use std::time::Duration;

use crate::backend::Engine;
use crate::report::OutputSink;
use crate::runner::{FailurePolicy, RunConfig, RunError, Termination};

pub const DEFAULT_INDEX: &str = "wik";
pub const DEFAULT_HOST: &str = "127.0.0.1:7700";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_OPERATIONS: u64 = 100_000;
pub const DEFAULT_OUTPUT: &str = "benchmark.csv";

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Search backend to run against
    #[arg(long, value_enum, default_value_t = Engine::Memory)]
    pub engine: Engine,

    /// Backend address (host:port) for the http engine
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Index name on the backend
    #[arg(long, default_value = DEFAULT_INDEX)]
    pub index: String,

    /// Number of concurrent workers
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Total operations to run (default 100000)
    #[arg(long, conflicts_with = "duration")]
    pub operations: Option<u64>,

    /// Run for this many seconds instead of a fixed operation count
    #[arg(long)]
    pub duration: Option<f64>,

    /// CSV output file, or - for stdout
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT)]
    pub output: String,

    /// Count failed operations instead of aborting the run
    #[arg(long)]
    pub tolerate_failures: bool,
}

/// Validated settings for one benchmark invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub engine: Engine,
    pub host: String,
    pub index: String,
    pub run: RunConfig,
    pub output: OutputSink,
}

impl BenchConfig {
    /// Check the flags and resolve them into a run configuration. Nothing
    /// has touched a backend yet when this fails.
    pub fn from_args(args: &CommonArgs) -> Result<Self, RunError> {
        let termination = match (args.operations, args.duration) {
            (Some(_), Some(_)) => {
                return Err(RunError::Config(
                    "--operations and --duration cannot be combined".to_string(),
                ))
            }
            (_, Some(secs)) => Termination::Deadline(parse_duration(secs)?),
            (ops, None) => Termination::Operations(ops.unwrap_or(DEFAULT_OPERATIONS)),
        };
        let policy = if args.tolerate_failures {
            FailurePolicy::Tolerate
        } else {
            FailurePolicy::Abort
        };
        let run = RunConfig::new(args.concurrency, termination).with_failure_policy(policy);
        run.validate()?;

        if args.index.trim().is_empty() {
            return Err(RunError::Config("index name must not be empty".to_string()));
        }
        if args.engine == Engine::Http && args.host.trim().is_empty() {
            return Err(RunError::Config("--host is required for the http engine".to_string()));
        }
        if args.output.is_empty() {
            return Err(RunError::Config("output path must not be empty".to_string()));
        }

        Ok(Self {
            engine: args.engine,
            host: args.host.clone(),
            index: args.index.clone(),
            run,
            output: OutputSink::from_arg(&args.output),
        })
    }
}

fn parse_duration(secs: f64) -> Result<Duration, RunError> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| RunError::Config(format!("invalid duration: {secs} seconds")))
}
