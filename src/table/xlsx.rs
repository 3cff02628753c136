//! Excel workbooks. Reading takes the first worksheet; writing produces a
//! single sheet with a bold header row.

use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx, XlsxError};
use rust_xlsxwriter::{Format, Workbook};

use super::{Cell, Table, TableError};

/// Whole numbers below this magnitude read back as integers.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

pub fn read_xlsx(path: &Path) -> Result<Table, TableError> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e: XlsxError| match e {
        XlsxError::Io(source) => TableError::Io {
            path: path.display().to_string(),
            source,
        },
        other => TableError::Xlsx(other.to_string()),
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TableError::Xlsx("workbook has no worksheets".to_string()))?
        .map_err(|e| TableError::Xlsx(e.to_string()))?;

    let mut rows = range.rows();
    let columns: Vec<String> = rows
        .next()
        .ok_or(TableError::NoHeader)?
        .iter()
        .map(|d| d.to_string().trim().to_string())
        .collect();

    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(row.iter().map(cell_from_data))?;
    }
    Ok(table)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => Cell::Int(*f as i64),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        other => Cell::Text(other.to_string()),
    }
}

pub fn write_xlsx(table: &Table, path: &Path) -> Result<(), TableError> {
    write_workbook(table, path).map_err(|e| TableError::Xlsx(e.to_string()))
}

fn write_workbook(table: &Table, path: &Path) -> Result<(), rust_xlsxwriter::XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let header = Format::new().set_bold();

    for (col, name) in table.columns().iter().enumerate() {
        sheet.write_string_with_format(0, col_num(col)?, name, &header)?;
    }

    for (i, row) in table.rows().iter().enumerate() {
        let r = row_num(i + 1)?;
        for (col, cell) in row.iter().enumerate() {
            let c = col_num(col)?;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Cell::Int(n) => {
                    sheet.write_number(r, c, *n as f64)?;
                }
                Cell::Float(f) => {
                    sheet.write_number(r, c, *f)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                Cell::Json(v) => {
                    sheet.write_string(r, c, v.to_string())?;
                }
            }
        }
    }

    workbook.save(path)
}

fn row_num(i: usize) -> Result<u32, rust_xlsxwriter::XlsxError> {
    u32::try_from(i).map_err(|_| rust_xlsxwriter::XlsxError::RowColumnLimitError)
}

fn col_num(i: usize) -> Result<u16, rust_xlsxwriter::XlsxError> {
    u16::try_from(i).map_err(|_| rust_xlsxwriter::XlsxError::RowColumnLimitError)
}
