//! Seams towards the external tabular input adapter and document exporter.

use crate::cell::Row;
use crate::error::{AuditError, AuditResult};

/// Produces the rows of one uploaded file (row 0 = headers).
pub trait TabularSource {
    /// Human-readable name used in error messages.
    fn name(&self) -> &str;

    fn read_rows(&self) -> AuditResult<Vec<Row>>;
}

/// Renders a finished table (report, template) somewhere.
pub trait DocumentExporter {
    fn export(&mut self, document: &str, rows: &[Row]) -> AuditResult<()>;
}

/// Rows held in memory (tests, embedding callers).
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    name: String,
    rows: Vec<Row>,
}

impl InMemorySource {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

impl TabularSource for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_rows(&self) -> AuditResult<Vec<Row>> {
        Ok(self.rows.clone())
    }
}

/// Collects exported documents in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExporter {
    documents: Vec<(String, Vec<Row>)>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, name: &str) -> Option<&[Row]> {
        self.documents
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, rows)| rows.as_slice())
    }
}

impl DocumentExporter for InMemoryExporter {
    fn export(&mut self, document: &str, rows: &[Row]) -> AuditResult<()> {
        if document.trim().is_empty() {
            return Err(AuditError::source_failure("document name cannot be empty"));
        }
        self.documents.push((document.to_string(), rows.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;

    #[test]
    fn exporter_keeps_latest_document_by_name() {
        let mut exporter = InMemoryExporter::new();
        exporter
            .export("report", &[vec![CellValue::text("v1")]])
            .unwrap();
        exporter
            .export("report", &[vec![CellValue::text("v2")]])
            .unwrap();
        assert_eq!(
            exporter.document("report").unwrap(),
            &[vec![CellValue::text("v2")]]
        );
        assert!(exporter.export(" ", &[]).is_err());
    }

    #[test]
    fn memory_source_returns_its_rows() {
        let source = InMemorySource::new("dms", vec![vec![CellValue::text("Part No")]]);
        assert_eq!(source.name(), "dms");
        assert_eq!(source.read_rows().unwrap().len(), 1);
    }
}
