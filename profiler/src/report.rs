//! CSV result files: one per job plus a global index.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};

/// Job identifiers count up from here; the value is arbitrary but stable so
/// that job files from different runs sort alike.
pub const JOB_ID_START: u32 = 84_140_904;

pub type JobId = u32;

/// One measured sweep point.
pub struct Row {
    /// Sweep variable value.
    pub variable: String,
    /// Median elapsed time per invocation, milliseconds.
    pub t_median: f64,
    /// Reusable scratch bytes after the run.
    pub memory_bytes: usize,
}

/// Sink of every result file of one profiler run. Per-job files need no
/// coordination; the shared index is serialised by a mutex.
pub struct ResultSink {
    root: PathBuf,
    index: Mutex<csv::Writer<File>>,
}

impl ResultSink {
    const INDEX_FILENAME: &'static str = "Content.csv";

    pub fn create(root: PathBuf) -> Result<Self> {
        let path = root.join(Self::INDEX_FILENAME);
        let mut index = csv::Writer::from_path(&path)
            .with_context(|| format!("creating the index at {}", path.display()))?;
        index.write_record([
            "job id",
            "job title",
            "regionfield generator name",
            "splatting name",
            "container trait tag",
            "custom tag",
        ])?;
        index.flush()?;
        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    /// Write the per-job CSV with one row per sweep point.
    pub fn write_job(&self, id: JobId, rows: &[Row]) -> Result<()> {
        let path = self.root.join(format!("{id}.csv"));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating the job report at {}", path.display()))?;
        writer.write_record(["variable", "t_median", "memory"])?;
        for row in rows {
            writer.write_record([
                row.variable.clone(),
                format!("{:.2}", row.t_median),
                // Kilobytes, rounded.
                format!("{:.0}", row.memory_bytes as f64 / 1e3),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Append one job line to the global index.
    pub fn append_index(
        &self,
        id: JobId,
        title: &str,
        generator_name: &str,
        splatting_name: &str,
        container_tag: &str,
        custom_tag: &str,
    ) -> Result<()> {
        let id = id.to_string();
        let mut index = self.index.lock().expect("index writer poisoned");
        index.write_record([
            id.as_str(),
            title,
            generator_name,
            splatting_name,
            container_tag,
            custom_tag,
        ])?;
        index.flush()?;
        Ok(())
    }
}
