use searchbench_common::BenchError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::histogram::{LatencyHistogram, Percentiles};
use crate::operation::Operation;

/// When workers stop claiming new work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Hand out exactly this many operations across all workers.
    Operations(u64),
    /// Start no new operation once this much wall-clock time has passed;
    /// operations already in flight finish and are counted.
    Deadline(Duration),
}

/// What a failed operation does to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The first failure stops every worker and the run returns an error.
    #[default]
    Abort,
    /// Failures are counted and excluded from latency statistics.
    Tolerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub concurrency: usize,
    pub termination: Termination,
    pub failure_policy: FailurePolicy,
}

impl RunConfig {
    pub fn new(concurrency: usize, termination: Termination) -> Self {
        Self { concurrency, termination, failure_policy: FailurePolicy::Abort }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.concurrency == 0 {
            return Err(RunError::Config("concurrency must be at least 1".to_string()));
        }
        match self.termination {
            Termination::Operations(0) => {
                Err(RunError::Config("operation count must be at least 1".to_string()))
            }
            Termination::Deadline(d) if d.is_zero() => {
                Err(RunError::Config("duration must be greater than zero".to_string()))
            }
            Termination::Deadline(d) => deadline_after(Instant::now(), d).map(|_| ()),
            Termination::Operations(_) => Ok(()),
        }
    }
}

fn deadline_after(start: Instant, duration: Duration) -> Result<Instant, RunError> {
    start
        .checked_add(duration)
        .ok_or_else(|| RunError::Config(format!("duration of {}s is out of range", duration.as_secs())))
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("operation failed on worker {worker} after {completed} completed operations: {source}")]
    OperationFailed {
        worker: usize,
        completed: u64,
        source: BenchError,
    },

    #[error("worker task failed: {0}")]
    WorkerPanicked(String),
}

/// Shared state of one run: the histogram, counters and stop flag every
/// worker updates. Built fresh for each run.
#[derive(Default)]
pub struct RunContext {
    histogram: LatencyHistogram,
    claimed: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    total_latency_ns: AtomicU64,
    stop: AtomicBool,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim one unit of work. `false` means the worker should exit.
    ///
    /// In operation-count mode the ticket is taken before the operation runs,
    /// so exactly `target` claims ever succeed.
    fn claim(&self, limit: Limit) -> bool {
        if self.is_stopped() {
            return false;
        }
        match limit {
            Limit::Tickets(target) => self.claimed.fetch_add(1, Ordering::Relaxed) < target,
            Limit::Until(deadline) => Instant::now() < deadline,
        }
    }

    pub fn record_success(&self, elapsed: Duration) {
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_latency_ns.fetch_add(ns, Ordering::Relaxed);
        self.histogram.record_ns(ns);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn histogram(&self) -> &LatencyHistogram {
        &self.histogram
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn total_latency_ns(&self) -> u64 {
        self.total_latency_ns.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy)]
enum Limit {
    Tickets(u64),
    Until(Instant),
}

/// Outcome of a completed run.
pub struct RunSummary {
    pub concurrency: usize,
    pub completed: u64,
    pub failed: u64,
    pub elapsed: Duration,
    pub total_latency_ns: u64,
    pub percentiles: Percentiles,
    /// Samples that landed in a histogram bucket.
    pub in_range: u64,
    /// Samples beyond the histogram ceiling, in milliseconds.
    pub long_tail: Vec<f64>,
}

impl RunSummary {
    /// Completed operations per second of wall-clock time.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.completed as f64 / secs
    }

    /// Mean latency of completed operations in milliseconds.
    pub fn avg_latency_ms(&self) -> Option<f64> {
        if self.completed == 0 {
            return None;
        }
        Some(self.total_latency_ns as f64 / self.completed as f64 / 1_000_000.0)
    }

    /// Fraction of attempted operations that failed.
    pub fn failure_rate(&self) -> f64 {
        let attempted = self.completed + self.failed;
        if attempted == 0 {
            return 0.0;
        }
        self.failed as f64 / attempted as f64
    }
}

struct WorkerFailure {
    worker: usize,
    source: BenchError,
}

/// Drive `operation` from `config.concurrency` workers until the termination
/// condition is met, then join every worker and summarize.
pub async fn run<O: Operation>(config: &RunConfig, operation: Arc<O>) -> Result<RunSummary, RunError> {
    config.validate()?;

    let ctx = Arc::new(RunContext::new());
    let started = Instant::now();
    let limit = match config.termination {
        Termination::Operations(target) => Limit::Tickets(target),
        Termination::Deadline(duration) => Limit::Until(deadline_after(started, duration)?),
    };

    tracing::info!(
        concurrency = config.concurrency,
        termination = ?config.termination,
        policy = ?config.failure_policy,
        "starting run"
    );

    let mut workers = JoinSet::new();
    for worker in 0..config.concurrency {
        workers.spawn(worker_loop(
            worker,
            Arc::clone(&ctx),
            Arc::clone(&operation),
            limit,
            config.failure_policy,
        ));
    }

    let mut first_error: Option<RunError> = None;
    while let Some(joined) = workers.join_next().await {
        let error = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(failure)) => RunError::OperationFailed {
                worker: failure.worker,
                completed: 0,
                source: failure.source,
            },
            Err(e) => RunError::WorkerPanicked(e.to_string()),
        };
        ctx.stop();
        first_error.get_or_insert(error);
    }
    let elapsed = started.elapsed();

    if let Some(mut error) = first_error {
        // Every worker has drained by now, so the count is final.
        if let RunError::OperationFailed { completed, .. } = &mut error {
            *completed = ctx.completed();
        }
        tracing::error!(error = %error, "run aborted");
        return Err(error);
    }

    let histogram = ctx.histogram();
    let summary = RunSummary {
        concurrency: config.concurrency,
        completed: ctx.completed(),
        failed: ctx.failed(),
        elapsed,
        total_latency_ns: ctx.total_latency_ns(),
        percentiles: histogram.percentiles(),
        in_range: histogram.in_range_total(),
        long_tail: histogram.long_tail(),
    };
    tracing::info!(
        completed = summary.completed,
        failed = summary.failed,
        elapsed_ms = elapsed.as_millis() as u64,
        "run finished"
    );
    Ok(summary)
}

async fn worker_loop<O: Operation>(
    worker: usize,
    ctx: Arc<RunContext>,
    operation: Arc<O>,
    limit: Limit,
    policy: FailurePolicy,
) -> Result<(), WorkerFailure> {
    while ctx.claim(limit) {
        let op_start = Instant::now();
        let result = operation.execute(worker).await;
        let elapsed = op_start.elapsed();

        match result {
            Ok(()) => ctx.record_success(elapsed),
            Err(source) => match policy {
                FailurePolicy::Abort => {
                    ctx.stop();
                    return Err(WorkerFailure { worker, source });
                }
                FailurePolicy::Tolerate => {
                    tracing::debug!(worker, error = %source, "operation failed");
                    ctx.record_failure();
                }
            },
        }
    }
    Ok(())
}
