use crate::constants::{get_supported_storage, CSV_STORAGE, JSONL_STORAGE, MEMORY_STORAGE};
use crate::config::StorageConfig;
use crate::error::{Result, ScraperError};
use crate::record::{BusinessRecord, RecordLayout};
use async_trait::async_trait;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Destination for validated records. Appends only; never rewrites existing content.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Human-readable destination, for logs
    fn describe(&self) -> String;

    /// Make the destination ready. Safe to call more than once; writes any header only when the
    /// destination is empty.
    async fn setup(&self) -> Result<()>;

    /// Append one batch of records.
    async fn save(&self, records: &[BusinessRecord]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Csv,
    JsonLines,
    Memory,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Csv => CSV_STORAGE,
            StorageKind::JsonLines => JSONL_STORAGE,
            StorageKind::Memory => MEMORY_STORAGE,
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            CSV_STORAGE => Ok(StorageKind::Csv),
            JSONL_STORAGE | "json" => Ok(StorageKind::JsonLines),
            MEMORY_STORAGE => Ok(StorageKind::Memory),
            other => Err(format!(
                "Unsupported storage type: {other} (expected one of: {})",
                get_supported_storage().join(", ")
            )),
        }
    }
}

/// Build the configured sink.
pub fn create_sink(config: &StorageConfig, layout: RecordLayout) -> Result<Arc<dyn RecordSink>> {
    let require_path = || {
        config.path.clone().ok_or_else(|| {
            ScraperError::Config(format!("Missing 'file_path' for {} storage", config.kind))
        })
    };
    let sink: Arc<dyn RecordSink> = match config.kind {
        StorageKind::Csv => Arc::new(CsvSink::new(require_path()?, layout)),
        StorageKind::JsonLines => Arc::new(JsonLinesSink::new(require_path()?)),
        StorageKind::Memory => Arc::new(InMemorySink::new()),
    };
    info!("Initialized {} storage at {}", config.kind, sink.describe());
    Ok(sink)
}

fn storage_error(path: &Path, action: &str, err: impl fmt::Display) -> ScraperError {
    ScraperError::Storage {
        message: format!("failed to {} {}: {}", action, path.display(), err),
    }
}

fn open_for_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Comma-separated output with a single header row.
pub struct CsvSink {
    path: PathBuf,
    layout: RecordLayout,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, layout: RecordLayout) -> Self {
        Self {
            path: path.into(),
            layout,
        }
    }

    /// Encode rows in memory so a failure part-way through leaves the file untouched.
    fn encode<I, R>(&self, rows: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator,
        R::Item: AsRef<[u8]>,
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for row in rows {
            writer
                .write_record(row)
                .map_err(|e| storage_error(&self.path, "encode", e))?;
        }
        writer
            .into_inner()
            .map_err(|e| storage_error(&self.path, "encode", e.error()))
    }

    fn append(&self, bytes: &[u8]) -> Result<()> {
        let mut file =
            open_for_append(&self.path).map_err(|e| storage_error(&self.path, "open", e))?;
        file.write_all(bytes)
            .map_err(|e| storage_error(&self.path, "write", e))
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn setup(&self) -> Result<()> {
        let file = open_for_append(&self.path).map_err(|e| storage_error(&self.path, "open", e))?;
        let existing = file
            .metadata()
            .map_err(|e| storage_error(&self.path, "inspect", e))?
            .len();
        if existing > 0 {
            debug!("CSV file {} already has content; header not written", self.path.display());
            return Ok(());
        }

        let header = self.encode([self.layout.header()])?;
        self.append(&header)?;
        info!("CSV header written to {}", self.path.display());
        Ok(())
    }

    async fn save(&self, records: &[BusinessRecord]) -> Result<()> {
        info!("Saving {} records to CSV: {}", records.len(), self.path.display());
        let rows = self.encode(records.iter().map(|record| record.to_row(self.layout)))?;
        self.append(&rows)?;
        debug!("Successfully saved {} records", records.len());
        Ok(())
    }
}

/// One JSON object per line; no header.
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn setup(&self) -> Result<()> {
        open_for_append(&self.path).map_err(|e| storage_error(&self.path, "open", e))?;
        Ok(())
    }

    async fn save(&self, records: &[BusinessRecord]) -> Result<()> {
        info!("Saving {} records to JSON lines: {}", records.len(), self.path.display());
        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }
        let mut file =
            open_for_append(&self.path).map_err(|e| storage_error(&self.path, "open", e))?;
        file.write_all(&buffer)
            .map_err(|e| storage_error(&self.path, "write", e))?;
        Ok(())
    }
}

/// Keeps every saved batch in memory, in save order. Used for dry runs and tests.
#[derive(Default, Clone)]
pub struct InMemorySink {
    batches: Arc<Mutex<Vec<Vec<BusinessRecord>>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the saved batches
    pub fn batches(&self) -> Vec<Vec<BusinessRecord>> {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn records(&self) -> Vec<BusinessRecord> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl RecordSink for InMemorySink {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self, records: &[BusinessRecord]) -> Result<()> {
        let mut batches = self.batches.lock().map_err(|_| ScraperError::Storage {
            message: "in-memory sink lock poisoned".to_string(),
        })?;
        batches.push(records.to_vec());
        Ok(())
    }
}
