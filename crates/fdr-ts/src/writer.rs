//! Destinations for time-series points.
//!
//! Every writer reports failures as [`FdrError::SinkUnavailable`]; the
//! simulation treats that as fatal for the run.

use crate::point::{encode_batch, TimeSeriesPoint};
use fdr_core::{FdrError, FdrResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub trait PointWriter {
    fn write_points(&mut self, points: &[TimeSeriesPoint]) -> FdrResult<()>;
}

/// Connection settings for an InfluxDB 1.x server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub timeout_secs: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: "influx".to_string(),
            port: 8086,
            database: "grid".to_string(),
            timeout_secs: 5,
        }
    }
}

impl InfluxConfig {
    pub fn write_url(&self) -> String {
        format!("http://{}:{}/write", self.host, self.port)
    }
}

/// Writes batches over the InfluxDB 1.x HTTP `/write` endpoint.
pub struct InfluxWriter {
    agent: ureq::Agent,
    config: InfluxConfig,
}

impl InfluxWriter {
    pub fn new(config: InfluxConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { agent, config }
    }

    pub fn config(&self) -> &InfluxConfig {
        &self.config
    }
}

impl PointWriter for InfluxWriter {
    fn write_points(&mut self, points: &[TimeSeriesPoint]) -> FdrResult<()> {
        if points.is_empty() {
            return Ok(());
        }
        let body = encode_batch(points)?;
        let url = self.config.write_url();

        let result = self
            .agent
            .post(&url)
            .query("db", &self.config.database)
            .query("precision", "ns")
            .set("Content-Type", "text/plain; charset=utf-8")
            .send_string(&body);

        match result {
            Ok(response) => {
                tracing::trace!(status = response.status(), count = points.len(), "influx write");
                Ok(())
            }
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                Err(FdrError::SinkUnavailable(format!(
                    "InfluxDB at {} rejected write with status {}: {}",
                    url,
                    code,
                    detail.trim()
                )))
            }
            Err(err) => Err(FdrError::SinkUnavailable(format!(
                "InfluxDB at {} unreachable: {}",
                url, err
            ))),
        }
    }
}

/// One JSON object per point, one point per line.
pub struct JsonLinesWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl JsonLinesWriter {
    /// Create (or truncate) the output file, creating parent directories.
    pub fn create(path: impl AsRef<Path>) -> FdrResult<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |e: std::io::Error| {
            FdrError::SinkUnavailable(format!("cannot open {}: {}", path.display(), e))
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(unavailable)?;
        }
        let file = File::create(&path).map_err(unavailable)?;
        Ok(Self {
            out: BufWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_failed(&self, err: impl std::fmt::Display) -> FdrError {
        FdrError::SinkUnavailable(format!("write to {} failed: {}", self.path.display(), err))
    }
}

impl PointWriter for JsonLinesWriter {
    fn write_points(&mut self, points: &[TimeSeriesPoint]) -> FdrResult<()> {
        for point in points {
            serde_json::to_writer(&mut self.out, point)
                .map_err(|e| self.write_failed(e))?;
            self.out
                .write_all(b"\n")
                .map_err(|e| self.write_failed(e))?;
        }
        self.out.flush().map_err(|e| self.write_failed(e))
    }
}

/// Keeps every batch in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryWriter {
    batches: Vec<Vec<TimeSeriesPoint>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[Vec<TimeSeriesPoint>] {
        &self.batches
    }

    pub fn points(&self) -> impl Iterator<Item = &TimeSeriesPoint> {
        self.batches.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PointWriter for MemoryWriter {
    fn write_points(&mut self, points: &[TimeSeriesPoint]) -> FdrResult<()> {
        self.batches.push(points.to_vec());
        Ok(())
    }
}
