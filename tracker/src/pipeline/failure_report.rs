use std::{
    fs::{self, File},
    io::Write,
    path::PathBuf,
};

use anyhow::Context;
use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::{AppError, AppResult};

use super::types::FailureEntry;

const HEADER: &str = "Date,Email,Subject,Body,Reason\n";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Writes the run's failure entries to a CSV for manual review
#[derive(Debug, Clone)]
pub struct FailureReporter {
    path: PathBuf,
}

impl FailureReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Overwrites the report file. Returns the number of rows written.
    pub fn report(&self, entries: &[FailureEntry]) -> AppResult<usize> {
        if entries.is_empty() {
            tracing::info!("All job emails parsed and written successfully");
            return Ok(0);
        }

        self.write_rows(entries).map_err(AppError::Report)?;
        tracing::info!(
            "Wrote {} failed jobs to {}",
            entries.len(),
            self.path.display()
        );
        Ok(entries.len())
    }

    fn write_rows(&self, entries: &[FailureEntry]) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }

        let mut file = File::create(&self.path)
            .with_context(|| format!("Could not create {}", self.path.display()))?;
        file.write_all(HEADER.as_bytes())?;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(file);

        for entry in entries {
            writer.write_record([
                entry.received_at.format(DATE_FORMAT).to_string(),
                sanitize(&entry.sender),
                sanitize(&entry.subject),
                sanitize(&entry.normalized_body),
                sanitize(&entry.reason),
            ])?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Double quotes become single quotes and line breaks become spaces
fn sanitize(field: &str) -> String {
    field
        .replace('"', "'")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}
