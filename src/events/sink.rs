use super::{EventRecord, SinkError};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Destination for event records.
pub trait EventSink: fmt::Debug + Send + Sync {
    fn write(&self, record: &EventRecord) -> Result<(), SinkError>;
}

/// Appends records as JSON lines to a file that rotates at midnight.
///
/// Writes go through a lossy non-blocking worker, so a slow or full disk
/// drops lines instead of stalling a connection.
#[derive(Clone)]
pub struct FileSink {
    writer: NonBlocking,
}

impl FileSink {
    /// The returned guard flushes outstanding lines when dropped.
    pub fn daily(dir: &Path, file_name: &str) -> Result<(Self, WorkerGuard), SinkError> {
        std::fs::create_dir_all(dir)?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(file_name)
            .build(dir)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        Ok((Self { writer }, guard))
    }
}

impl fmt::Debug for FileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSink").finish_non_exhaustive()
    }
}

impl EventSink for FileSink {
    fn write(&self, record: &EventRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut writer = self.writer.clone();
        writer.write_all(&line)?;
        Ok(())
    }
}

/// Keeps records in memory; handy for inspecting what the server reported.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<EventRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn write(&self, record: &EventRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Unavailable)?
            .push(record.clone());
        Ok(())
    }
}
