//! Tabular sources: one CSV file per node or relationship type.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use tracing::warn;

use assetrag_core::{RagError, RagResult};

/// One data row. Empty cells are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    index: usize,
    cells: BTreeMap<String, String>,
}

impl SourceRow {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            cells: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.set(column, value);
        self
    }

    /// 0-based position among data rows, stable across runs.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    pub fn set(&mut self, column: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.cells.remove(column);
        } else {
            self.cells.insert(column.to_string(), value.to_string());
        }
    }
}

/// A parsed source file.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<SourceRow>,
    /// Records that could not be decoded (invalid UTF-8).
    undecodable: usize,
}

impl SourceTable {
    pub fn new(name: impl Into<String>, columns: &[&str], rows: Vec<SourceRow>) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            undecodable: 0,
        }
    }

    /// Read a CSV file. A file that does not exist yields `Ok(None)`.
    pub fn read(path: &Path) -> RagResult<Option<Self>> {
        if !path.exists() {
            warn!(path = %path.display(), "Source file not found, skipping");
            return Ok(None);
        }
        let file = std::fs::File::open(path)
            .map_err(|e| RagError::source(path.display().to_string(), e))?;
        Self::from_reader(&path.display().to_string(), file).map(Some)
    }

    /// Parse CSV with a header row from any reader.
    ///
    /// Short rows read their missing trailing columns as absent and extra
    /// cells are ignored. A record that cannot be decoded is skipped and
    /// counted; only an I/O failure aborts the file.
    pub fn from_reader<R: Read>(name: &str, reader: R) -> RagResult<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv
            .headers()
            .map_err(|e| RagError::source(name, e))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        let mut undecodable = 0;
        for (index, record) in csv.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                    return Err(RagError::source(name, e))
                }
                Err(e) => {
                    warn!(source = name, row = index, error = %e, "Skipping undecodable row");
                    undecodable += 1;
                    continue;
                }
            };
            let mut row = SourceRow::new(index);
            for (column, value) in columns.iter().zip(record.iter()) {
                row.set(column, value);
            }
            rows.push(row);
        }

        Ok(Self {
            name: name.to_string(),
            columns,
            rows,
            undecodable,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[SourceRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [SourceRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dropped while parsing; loaders report them as invalid.
    pub fn undecodable(&self) -> usize {
        self.undecodable
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Fail with [`RagError::MissingColumns`] unless every column is present.
    pub fn require_columns<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> RagResult<()> {
        let missing: Vec<String> = required
            .into_iter()
            .filter(|c| !self.has_column(c))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RagError::MissingColumns {
                path: self.name.clone(),
                columns: missing,
            })
        }
    }
}
