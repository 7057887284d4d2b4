//! Metrics sinks
//!
//! `JsonlMetricsSink` hands records to a background writer task so the
//! caller never waits on disk. Files are partitioned by UTC month:
//! `<dir>/metrics-YYYY-MM.jsonl`, one JSON record per line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Datelike;
use shared::MetricsRecord;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{FallbackError, FallbackResult};
use crate::traits::MetricsSink;

enum SinkCommand {
    Record(Box<MetricsRecord>),
    Flush(oneshot::Sender<()>),
}

/// Append-only JSON-lines sink with monthly rotation
pub struct JsonlMetricsSink {
    dir: PathBuf,
    sender: mpsc::UnboundedSender<SinkCommand>,
}

impl JsonlMetricsSink {
    /// Create the sink and spawn its writer task (requires a tokio runtime)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<SinkCommand>();

        let writer_dir = dir.clone();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    SinkCommand::Record(record) => {
                        if let Err(e) = Self::write_record(&writer_dir, &record).await {
                            warn!(execution = %record.execution_id, "Failed to write metrics record: {}", e);
                        }
                    }
                    SinkCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { dir, sender: tx }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding records for `year`-`month`
    pub fn period_path(dir: &Path, year: i32, month: u32) -> PathBuf {
        dir.join(format!("metrics-{year:04}-{month:02}.jsonl"))
    }

    /// Parse a `YYYY-MM` period string
    pub fn parse_period(period: &str) -> FallbackResult<(i32, u32)> {
        let invalid = || FallbackError::InvalidPeriod {
            period: period.to_string(),
        };
        let (year, month) = period.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok((year, month))
    }

    /// Wait until every record appended so far has been written
    pub async fn flush(&self) -> FallbackResult<()> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(SinkCommand::Flush(tx)).map_err(|_| FallbackError::Metrics {
            message: "metrics writer stopped".to_string(),
        })?;
        rx.await.map_err(|_| FallbackError::Metrics {
            message: "metrics writer stopped before flushing".to_string(),
        })
    }

    /// Load every readable record of a `YYYY-MM` period; malformed lines are skipped
    pub async fn read_period(&self, period: &str) -> FallbackResult<Vec<MetricsRecord>> {
        let (year, month) = Self::parse_period(period)?;
        let path = Self::period_path(&self.dir, year, month);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FallbackError::Io(e)),
        };

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MetricsRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed metrics line {} in {}: {}", line_no + 1, path.display(), e),
            }
        }
        Ok(records)
    }

    async fn write_record(dir: &Path, record: &MetricsRecord) -> FallbackResult<()> {
        fs::create_dir_all(dir).await?;
        let path = Self::period_path(dir, record.timestamp.year(), record.timestamp.month());

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(execution = %record.execution_id, "📊 Wrote metrics record to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl MetricsSink for JsonlMetricsSink {
    async fn append(&self, record: MetricsRecord) -> FallbackResult<()> {
        self.sender
            .send(SinkCommand::Record(Box::new(record)))
            .map_err(|_| FallbackError::Metrics {
                message: "metrics writer stopped".to_string(),
            })
    }
}

/// In-memory sink, for embedding and tests
#[derive(Default)]
pub struct MemoryMetricsSink {
    records: RwLock<Vec<MetricsRecord>>,
}

impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<MetricsRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl MetricsSink for MemoryMetricsSink {
    async fn append(&self, record: MetricsRecord) -> FallbackResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }
}
