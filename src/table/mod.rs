//! In-memory tables and the file formats they are read from and written to.

mod cell;
mod csv;
mod json;
mod xlsx;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use self::cell::Cell;
pub use self::csv::{escape_csv, parse_csv, write_csv};
pub use self::json::{parse_json, parse_jsonl, write_json, write_jsonl};
pub use self::xlsx::{read_xlsx, write_xlsx};

/// Suffix added to the input file stem for the default output path.
pub const OUTPUT_SUFFIX: &str = "_clasificado";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported table format '{0}' (expected .csv, .xlsx, .json or .jsonl)")]
    UnsupportedFormat(String),

    #[error("CSV error at line {line}: {reason}")]
    Csv { line: usize, reason: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Spreadsheet error: {0}")]
    Xlsx(String),

    #[error("Row {row} has {fields} fields but the header has {columns}")]
    Ragged {
        row: usize,
        fields: usize,
        columns: usize,
    },

    #[error("Table has no header")]
    NoHeader,
}

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
    Json,
    Jsonl,
}

impl TableFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            _ => Err(TableError::UnsupportedFormat(
                path.display().to_string(),
            )),
        }
    }
}

/// A rectangular table of typed cells with named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table, padding short rows with empty cells.
    pub fn from_rows<C>(columns: Vec<String>, rows: Vec<Vec<C>>) -> Result<Self, TableError>
    where
        C: Into<Cell>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row<I, C>(&mut self, row: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        let mut row: Vec<Cell> = row.into_iter().map(Into::into).collect();
        if row.len() > self.columns.len() {
            return Err(TableError::Ragged {
                row: self.rows.len() + 1,
                fields: row.len(),
                columns: self.columns.len(),
            });
        }
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column. Exact match first, then ignoring surrounding whitespace.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.trim() == name.trim()))
    }

    /// Values of one column in row order, rendered as text.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = Cow<'_, str>> {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(Cell::as_text).unwrap_or(Cow::Borrowed("")))
    }

    /// Keep only the first `n` rows.
    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    /// Set a column from `values`, appending it when missing.
    ///
    /// `values` is aligned with the first rows; rows beyond it get "".
    pub fn set_column<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = match self.columns.iter().position(|c| c == name) {
            Some(i) => i,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Cell::Empty);
                }
                self.columns.len() - 1
            }
        };

        let mut values = values.into_iter();
        for row in &mut self.rows {
            row[index] = Cell::Text(values.next().map(Into::into).unwrap_or_default());
        }
    }

    /// Read a table, choosing the codec by extension.
    pub fn read(path: &Path) -> Result<Self, TableError> {
        let read_text = || {
            std::fs::read_to_string(path).map_err(|source| TableError::Io {
                path: path.display().to_string(),
                source,
            })
        };
        match TableFormat::from_path(path)? {
            TableFormat::Csv => parse_csv(&read_text()?),
            TableFormat::Xlsx => read_xlsx(path),
            TableFormat::Json => parse_json(&read_text()?),
            TableFormat::Jsonl => parse_jsonl(&read_text()?),
        }
    }

    /// Write a table, choosing the codec by extension.
    pub fn write(&self, path: &Path) -> Result<(), TableError> {
        let contents = match TableFormat::from_path(path)? {
            TableFormat::Csv => write_csv(self),
            TableFormat::Json => write_json(self)?,
            TableFormat::Jsonl => write_jsonl(self)?,
            TableFormat::Xlsx => return write_xlsx(self, path),
        };
        std::fs::write(path, contents).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// `reportes.csv` -> `reportes_clasificado.csv`, in the same directory.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resultados".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, OUTPUT_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, OUTPUT_SUFFIX),
    };
    input.with_file_name(name)
}
