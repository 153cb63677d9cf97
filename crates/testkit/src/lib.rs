#![warn(missing_docs)]
//! Shared test surfaces: fixtures, proptest strategies and the metrics
//! reports emitted by the claim worldtests.

mod fixtures;
mod metrics;
mod strategies;

use anyhow::Result;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub use fixtures::*;
pub use metrics::*;
pub use strategies::*;

/// One registry operation captured by a scenario test.
#[derive(Debug, Serialize)]
pub struct EventRecord<'a> {
    /// Step number inside the scenario.
    pub step: u64,
    /// Operation label, e.g. `claim`, `check` or `remove`.
    pub op: &'a str,
    /// Regions held by the registry after the operation.
    pub regions: usize,
    /// What the operation touched or answered.
    pub detail: String,
}

/// Appends [`EventRecord`]s to a file as newline-delimited JSON.
pub struct JsonlSink {
    file: File,
    next_step: u64,
}

impl JsonlSink {
    /// Create (or truncate) the log at `path`, creating parent directories.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self { file, next_step: 0 })
    }

    /// Append an event with the next step number.
    pub fn record(&mut self, op: &str, regions: usize, detail: impl Into<String>) -> Result<()> {
        let event = EventRecord {
            step: self.next_step,
            op,
            regions,
            detail: detail.into(),
        };
        let line = serde_json::to_string(&event)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.next_step += 1;
        Ok(())
    }

    /// Number of events written so far.
    pub fn steps(&self) -> u64 {
        self.next_step
    }
}
