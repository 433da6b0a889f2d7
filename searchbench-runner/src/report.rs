use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::runner::RunSummary;

/// One line of benchmark output: what ran, and how it performed.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRecord {
    pub engine: String,
    pub title: String,
    pub concurrency: usize,
    pub throughput: f64,
    pub avg_latency_ms: Option<f64>,
    pub total_operations: u64,
    pub median_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

impl BenchmarkRecord {
    pub fn from_summary(engine: &str, title: &str, summary: &RunSummary) -> Self {
        Self {
            engine: engine.to_string(),
            title: title.to_string(),
            concurrency: summary.concurrency,
            throughput: summary.throughput(),
            avg_latency_ms: summary.avg_latency_ms(),
            total_operations: summary.completed,
            median_ms: summary.percentiles.median,
            p95_ms: summary.percentiles.p95,
            p99_ms: summary.percentiles.p99,
        }
    }

    pub fn csv_header() -> &'static str {
        "engine,title,concurrency,throughput_ops_per_sec,avg_latency_ms,total_operations,median_latency_ms,p95_latency_ms,p99_latency_ms"
    }

    /// The record as one CSV line, without the trailing newline. Missing
    /// statistics are left as empty fields.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{:.2},{},{},{},{},{}",
            csv_field(&self.engine),
            csv_field(&self.title),
            self.concurrency,
            self.throughput,
            fmt_opt(self.avg_latency_ms),
            self.total_operations,
            fmt_opt(self.median_ms),
            fmt_opt(self.p95_ms),
            fmt_opt(self.p99_ms),
        )
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

/// Quote a field if it holds a comma, quote or line break; inner quotes are doubled.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Where benchmark records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    Stdout,
    File(PathBuf),
}

impl OutputSink {
    /// `-` means stdout; anything else is a file path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            OutputSink::Stdout
        } else {
            OutputSink::File(PathBuf::from(arg))
        }
    }
}

/// Append `record` to `sink`. A file sink is created on first use and gets
/// the header line once, while it is still empty; existing content is never
/// rewritten.
pub fn append_record(sink: &OutputSink, record: &BenchmarkRecord) -> io::Result<()> {
    match sink {
        OutputSink::Stdout => {
            let mut out = io::stdout().lock();
            writeln!(out, "{}", record.to_csv_row())?;
            out.flush()
        }
        OutputSink::File(path) => {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            if file.metadata()?.len() == 0 {
                writeln!(file, "{}", BenchmarkRecord::csv_header())?;
            }
            writeln!(file, "{}", record.to_csv_row())?;
            file.flush()
        }
    }
}

fn fmt_ms(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2} ms")).unwrap_or_else(|| "n/a".to_string())
}

/// Human-readable summary of a run, printed once at the end.
pub fn print_report(title: &str, summary: &RunSummary) {
    println!("{title}");
    println!("{}", "=".repeat(title.chars().count().max(1)));
    println!("Duration:              {:.3} s", summary.elapsed.as_secs_f64());
    println!("Concurrency:           {}", summary.concurrency);
    println!("Throughput:            {:.2} ops/s", summary.throughput());
    println!("Average latency:       {}", fmt_ms(summary.avg_latency_ms()));
    println!(
        "Latencies (p50/p95/p99): {} / {} / {}",
        fmt_ms(summary.percentiles.median),
        fmt_ms(summary.percentiles.p95),
        fmt_ms(summary.percentiles.p99),
    );
    if summary.failed > 0 {
        println!(
            "Failures:              {} ({:.3}%)",
            summary.failed,
            summary.failure_rate() * 100.0
        );
    }
    if !summary.long_tail.is_empty() {
        let samples: Vec<String> = summary.long_tail.iter().map(|ms| format!("{ms:.1}")).collect();
        println!("Long tail (ms):        {}", samples.join(", "));
    }
    println!("Total:                 {} operations", summary.completed);
}
