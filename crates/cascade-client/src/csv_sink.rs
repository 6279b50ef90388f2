use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use cascade_core::{AppError, Record, RecordSink};

/// Writes records as CSV rows under a fixed header.
///
/// Columns are written in header order. A column the record lacks, or
/// holds null for, is written empty; fields outside the header are ignored.
pub struct CsvSink<W: Write + Send> {
    writer: csv::Writer<W>,
    columns: Vec<String>,
}

impl CsvSink<BufWriter<File>> {
    pub fn create(path: &Path, columns: Vec<String>) -> Result<Self, AppError> {
        let file = File::create(path).map_err(|e| {
            AppError::SinkError(format!("Failed to create {}: {e}", path.display()))
        })?;
        Self::from_writer(BufWriter::new(file), columns)
    }
}

impl<W: Write + Send> CsvSink<W> {
    pub fn from_writer(writer: W, columns: Vec<String>) -> Result<Self, AppError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&columns).map_err(sink_error)?;
        Ok(Self { writer, columns })
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W, AppError> {
        self.writer
            .into_inner()
            .map_err(|e| AppError::SinkError(e.to_string()))
    }
}

fn sink_error(e: csv::Error) -> AppError {
    AppError::SinkError(e.to_string())
}

impl<W: Write + Send> RecordSink for CsvSink<W> {
    fn write(&mut self, record: &Record) -> Result<(), AppError> {
        let row: Vec<String> = self
            .columns
            .iter()
            .map(|column| record.get(column).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        self.writer.write_record(&row).map_err(sink_error)
    }

    fn flush(&mut self) -> Result<(), AppError> {
        self.writer
            .flush()
            .map_err(|e| AppError::SinkError(e.to_string()))
    }
}
