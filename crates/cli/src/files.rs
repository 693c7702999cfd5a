//! JSON row files: the CLI's input adapter and document exporter.
//!
//! A file holds one JSON array of rows; each row is an array of strings,
//! numbers or nulls. Row 0 is the header row.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use stockaudit_core::{AuditError, AuditResult, DocumentExporter, Row, TabularSource};

pub struct JsonRowFile {
    path: PathBuf,
    name: String,
}

impl JsonRowFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }
}

impl TabularSource for JsonRowFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_rows(&self) -> AuditResult<Vec<Row>> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| AuditError::source_failure(format!("{}: {e}", self.name)))?;
        serde_json::from_str(&raw).map_err(|e| AuditError::source_failure(format!("{}: {e}", self.name)))
    }
}

/// Writes tables as pretty JSON, to a file or to stdout.
pub struct JsonExporter {
    out: Option<PathBuf>,
}

impl JsonExporter {
    pub fn new(out: Option<&Path>) -> Self {
        Self {
            out: out.map(Path::to_path_buf),
        }
    }
}

impl DocumentExporter for JsonExporter {
    fn export(&mut self, document: &str, rows: &[Row]) -> AuditResult<()> {
        let json = serde_json::to_string_pretty(rows)
            .map_err(|e| AuditError::source_failure(format!("{document}: {e}")))?;
        match &self.out {
            Some(path) => fs::write(path, json)
                .map_err(|e| AuditError::source_failure(format!("{}: {e}", path.display())))?,
            None => writeln!(std::io::stdout().lock(), "{json}")
                .map_err(|e| AuditError::source_failure(format!("{document}: {e}")))?,
        }
        tracing::info!(document, rows = rows.len(), "document exported");
        Ok(())
    }
}
