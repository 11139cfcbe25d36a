//! Generic two-dimensional tables read from uploaded CSV files.

use crate::error::{NutriWaveError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::{Map, Value};
use std::{fs::File, io::Read, path::Path};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);
        let headers = Self::to_vec(rdr.headers()?);
        let mut rows = vec![];
        for record in rdr.records() {
            match record {
                Ok(record) => rows.push(Self::to_vec(&record)),
                Err(e) => tracing::warn!("skipping unreadable CSV row: {e}"),
            }
        }
        Ok(Self { headers, rows })
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        Self::from_csv_reader(text.as_bytes())
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| NutriWaveError::io(path, e))?;
        let table = Self::from_csv_reader(file)?;
        tracing::info!(
            path = %path.display(),
            rows = table.row_count(),
            columns = table.headers.len(),
            "loaded table"
        );
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cells of one column; short rows contribute an empty cell.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(move |row| row.get(idx).map(String::as_str).unwrap_or("")),
        )
    }

    /// Rows as JSON objects keyed by header, leaving out empty cells so that
    /// record defaults apply.
    pub fn records_as_json(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row.iter())
                    .filter(|(header, cell)| !header.is_empty() && !cell.is_empty())
                    .map(|(header, cell)| (header.clone(), Value::String(cell.clone())))
                    .collect()
            })
            .collect()
    }

    fn to_vec(record: &StringRecord) -> Vec<String> {
        record.iter().map(|s| s.to_string()).collect()
    }
}
