//! Durable output for extracted records.
//!
//! [`DelimitedFileSink`] appends `;`-joined rows to a text file. The header row
//! is written only when the file did not exist beforehand, so repeated runs
//! keep appending to the same table.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::extract::{Record, TIMESTAMP_COLUMN, URL_COLUMN};

/// Column separator.
pub const DELIMITER: &str = ";";

/// Errors writing records.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Output file could not be opened
    #[error("cannot open output file {}: {source}", path.display())]
    Open {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing or flushing a row failed
    #[error("cannot write to output file {}: {source}", path.display())]
    Write {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl SinkError {
    fn open(path: &Path, source: std::io::Error) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write(path: &Path, source: std::io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Destination for extracted records.
#[async_trait]
pub trait RecordSink: Send {
    /// Appends one record. The record is durable once this returns.
    async fn write(&mut self, record: &Record) -> Result<(), SinkError>;
}

/// Appends records to a `;`-delimited text file.
#[derive(Debug)]
pub struct DelimitedFileSink {
    path: PathBuf,
    file: File,
}

impl DelimitedFileSink {
    /// Opens `path` for appending. When the file is new, a header row of
    /// `columns`, `url`, `timestamp` is written first.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the file cannot be opened or the header cannot
    /// be written.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open<'a>(
        path: impl AsRef<Path>,
        columns: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let existed = tokio::fs::try_exists(&path).await.unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| SinkError::open(&path, e))?;

        let mut sink = Self { path, file };
        if existed {
            debug!("appending to existing output file");
        } else {
            let header = columns
                .into_iter()
                .chain([URL_COLUMN, TIMESTAMP_COLUMN])
                .collect::<Vec<_>>()
                .join(DELIMITER);
            sink.write_line(&header).await?;
            debug!(header = %header, "wrote header to new output file");
        }
        Ok(sink)
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.file
            .write_all(&bytes)
            .await
            .map_err(|e| SinkError::write(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| SinkError::write(&self.path, e))
    }
}

#[async_trait]
impl RecordSink for DelimitedFileSink {
    async fn write(&mut self, record: &Record) -> Result<(), SinkError> {
        let line = format_row(record);
        self.write_line(&line).await
    }
}

/// One output row: values in column order, newlines flattened, trimmed.
#[must_use]
pub fn format_row(record: &Record) -> String {
    record
        .values()
        .map(sanitize_value)
        .collect::<Vec<_>>()
        .join(DELIMITER)
}

fn sanitize_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ").trim().to_string()
}
