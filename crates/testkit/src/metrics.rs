//! Standardized metrics collection and reporting for CI.
//!
//! Worldtests export one JSON report per run so query latency and save size
//! regressions show up as diffs between runs.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Top-level metrics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Test identifier
    pub test_name: String,

    /// Timestamp when metrics were collected (RFC 3339)
    pub timestamp: String,

    /// Overall test result
    pub result: TestResult,

    /// Spatial index metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryMetrics>,

    /// Save/load metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence: Option<PersistenceMetrics>,

    /// Test execution metrics
    pub test_execution: TestExecutionMetrics,
}

/// Overall test result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    /// Test passed all validations
    Pass,
    /// Test failed
    Fail,
    /// Test was skipped
    Skip,
}

/// Registry size and query cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryMetrics {
    /// Regions registered at the end of the run
    pub regions: usize,

    /// Interval tree depth at the end of the run
    pub tree_depth: usize,

    /// Point queries issued
    pub point_queries: usize,

    /// Point queries that hit a region
    pub protected_hits: usize,

    /// Average point query time (microseconds)
    pub avg_query_time_us: f64,

    /// Regions removed during the run
    pub removals: usize,
}

/// Claim file save/load metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceMetrics {
    /// Regions saved
    pub regions_saved: usize,

    /// Regions loaded
    pub regions_loaded: usize,

    /// Save time (microseconds)
    pub save_time_us: u128,

    /// Load time (microseconds)
    pub load_time_us: u128,

    /// Claim file size on disk
    pub bytes_written: u64,
}

/// Test execution and infrastructure metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestExecutionMetrics {
    /// Total test duration (seconds)
    pub duration_seconds: f64,

    /// Number of assertions checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertions_checked: Option<usize>,

    /// Number of validations passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validations_passed: Option<usize>,
}

/// Builder for constructing metrics reports
pub struct MetricsReportBuilder {
    report: MetricsReport,
}

impl MetricsReportBuilder {
    /// Create a new builder with test name
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            report: MetricsReport {
                test_name: test_name.into(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                result: TestResult::Pass,
                registry: None,
                persistence: None,
                test_execution: TestExecutionMetrics::default(),
            },
        }
    }

    /// Set test result
    pub fn result(mut self, result: TestResult) -> Self {
        self.report.result = result;
        self
    }

    /// Set registry metrics
    pub fn registry(mut self, metrics: RegistryMetrics) -> Self {
        self.report.registry = Some(metrics);
        self
    }

    /// Set persistence metrics
    pub fn persistence(mut self, metrics: PersistenceMetrics) -> Self {
        self.report.persistence = Some(metrics);
        self
    }

    /// Set test execution metrics
    pub fn execution(mut self, metrics: TestExecutionMetrics) -> Self {
        self.report.test_execution = metrics;
        self
    }

    /// Build the metrics report
    pub fn build(self) -> MetricsReport {
        self.report
    }
}

/// Sink for writing metrics reports to JSON files
pub struct MetricsSink {
    path: std::path::PathBuf,
}

impl MetricsSink {
    /// Create a new metrics sink at the specified path
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Write metrics report to file
    pub fn write(&self, report: &MetricsReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_report_roundtrip() {
        let report = MetricsReportBuilder::new("claim_scenarios")
            .result(TestResult::Pass)
            .registry(RegistryMetrics {
                regions: 100,
                tree_depth: 14,
                point_queries: 5000,
                protected_hits: 1200,
                avg_query_time_us: 0.8,
                removals: 10,
            })
            .execution(TestExecutionMetrics {
                duration_seconds: 0.5,
                assertions_checked: Some(500),
                validations_passed: Some(500),
            })
            .build();

        let json = serde_json::to_string_pretty(&report).unwrap();
        let parsed: MetricsReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.test_name, "claim_scenarios");
        assert_eq!(parsed.result, TestResult::Pass);
        assert_eq!(parsed.registry.as_ref().unwrap().regions, 100);
        assert!(parsed.persistence.is_none());
    }

    #[test]
    fn metrics_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("metrics.json");
        let report = MetricsReportBuilder::new("sink_test")
            .result(TestResult::Pass)
            .build();

        let sink = MetricsSink::create(&path).unwrap();
        sink.write(&report).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("sink_test"));
        assert!(contents.contains("\"result\": \"pass\""));
    }
}
