use searchbench_runner::histogram::Percentiles;
use searchbench_runner::report::{append_record, csv_field, BenchmarkRecord, OutputSink};
use searchbench_runner::runner::RunSummary;
use std::path::PathBuf;
use std::time::Duration;

fn summary(percentiles: Percentiles, completed: u64) -> RunSummary {
    RunSummary {
        concurrency: 4,
        completed,
        failed: 0,
        elapsed: Duration::from_secs(2),
        total_latency_ns: completed * 2_500_000,
        percentiles,
        in_range: completed,
        long_tail: Vec::new(),
    }
}

fn full_percentiles() -> Percentiles {
    Percentiles { median: Some(2.5), p95: Some(4.75), p99: Some(4.9) }
}

#[test]
fn test_record_from_summary() {
    let record = BenchmarkRecord::from_summary("memory", "search: hello world 2", &summary(full_percentiles(), 1_000));
    assert_eq!(record.throughput, 500.0);
    assert_eq!(record.avg_latency_ms, Some(2.5));
    assert_eq!(record.total_operations, 1_000);
    assert_eq!(
        record.to_csv_row(),
        "memory,search: hello world 2,4,500.00,2.50,1000,2.50,4.75,4.90"
    );
}

#[test]
fn test_header_matches_row_width() {
    let record = BenchmarkRecord::from_summary("http", "suggest", &summary(full_percentiles(), 10));
    let header_fields = BenchmarkRecord::csv_header().split(',').count();
    assert_eq!(header_fields, 9);
    assert_eq!(record.to_csv_row().split(',').count(), header_fields);
}

#[test]
fn test_missing_statistics_are_empty_fields() {
    let record = BenchmarkRecord::from_summary("memory", "suggest", &summary(Percentiles::default(), 0));
    assert_eq!(record.avg_latency_ms, None);
    assert_eq!(record.to_csv_row(), "memory,suggest,4,0.00,,0,,,");
}

#[test]
fn test_csv_quoting() {
    assert_eq!(csv_field("plain"), "plain");
    assert_eq!(csv_field("a,b"), "\"a,b\"");
    assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");

    let record = BenchmarkRecord::from_summary("memory", "search: hello,world 2", &summary(full_percentiles(), 1_000));
    assert!(record.to_csv_row().starts_with("memory,\"search: hello,world 2\",4,"));
}

#[test]
fn test_output_sink_from_arg() {
    assert_eq!(OutputSink::from_arg("-"), OutputSink::Stdout);
    assert_eq!(OutputSink::from_arg("out.csv"), OutputSink::File(PathBuf::from("out.csv")));
}

#[test]
fn test_append_writes_header_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("benchmark.csv");
    let sink = OutputSink::File(path.clone());

    let first = BenchmarkRecord::from_summary("memory", "run one", &summary(full_percentiles(), 1_000));
    let second = BenchmarkRecord::from_summary("memory", "run two", &summary(full_percentiles(), 2_000));
    append_record(&sink, &first).expect("first append");
    append_record(&sink, &second).expect("second append");

    let contents = std::fs::read_to_string(&path).expect("read back");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], BenchmarkRecord::csv_header());
    assert_eq!(lines[1], first.to_csv_row());
    assert_eq!(lines[2], second.to_csv_row());
}

#[test]
fn test_append_keeps_existing_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("old.csv");
    std::fs::write(&path, "redis,search: old 1,1,1.00,1.00,1,1.00,1.00,1.00\n").expect("seed file");

    let record = BenchmarkRecord::from_summary("memory", "new", &summary(full_percentiles(), 1_000));
    append_record(&OutputSink::File(path.clone()), &record).expect("append");

    let contents = std::fs::read_to_string(&path).expect("read back");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("redis,"));
    assert_eq!(lines[1], record.to_csv_row());
}

#[test]
fn test_append_to_missing_directory_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sink = OutputSink::File(dir.path().join("no-such-dir").join("out.csv"));
    let record = BenchmarkRecord::from_summary("memory", "x", &summary(full_percentiles(), 1));
    assert!(append_record(&sink, &record).is_err());
}
