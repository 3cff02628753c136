//! RFC 4180 CSV reading and writing.

use super::{Table, TableError};

/// Quote a field only when it contains a delimiter, quote, or line break.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Parse CSV text. The first record is the header; blank lines are skipped.
pub fn parse_csv(source: &str) -> Result<Table, TableError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut records = parse_records(source)?.into_iter();
    let columns = records.next().ok_or(TableError::NoHeader)?;

    let mut table = Table::new(columns);
    for record in records {
        table.push_row(record)?;
    }
    Ok(table)
}

#[derive(Default)]
struct RecordBuilder {
    records: Vec<Vec<String>>,
    record: Vec<String>,
    field: String,
    quoted: bool,
}

impl RecordBuilder {
    fn end_field(&mut self) {
        self.record.push(std::mem::take(&mut self.field));
    }

    fn end_record(&mut self) {
        self.end_field();
        let blank = !self.quoted && self.record.len() == 1 && self.record[0].is_empty();
        if blank {
            self.record.clear();
        } else {
            self.records.push(std::mem::take(&mut self.record));
        }
        self.quoted = false;
    }
}

fn parse_records(source: &str) -> Result<Vec<Vec<String>>, TableError> {
    let mut b = RecordBuilder::default();
    let mut in_quotes = false;
    let mut line = 1;
    let mut quote_line = 1;

    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    b.field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    b.field.push(c);
                }
                _ => b.field.push(c),
            }
            continue;
        }

        match c {
            '"' if b.field.is_empty() => {
                in_quotes = true;
                b.quoted = true;
                quote_line = line;
            }
            ',' => b.end_field(),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                line += 1;
                b.end_record();
            }
            _ => b.field.push(c),
        }
    }

    if in_quotes {
        return Err(TableError::Csv {
            line: quote_line,
            reason: "unterminated quoted field".to_string(),
        });
    }
    if !b.field.is_empty() || !b.record.is_empty() || b.quoted {
        b.end_record();
    }
    Ok(b.records)
}

/// Render a table as CSV with a header line and `\n` line endings.
pub fn write_csv(table: &Table) -> String {
    let mut output = String::new();
    push_line(&mut output, table.columns().iter().map(|c| escape_csv(c)));
    for row in table.rows() {
        push_line(&mut output, row.iter().map(|c| escape_csv(&c.as_text())));
    }
    output
}

fn push_line(output: &mut String, fields: impl Iterator<Item = String>) {
    let line: Vec<String> = fields.collect();
    output.push_str(&line.join(","));
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_parse_basic() {
        let table = parse_csv("id,texto\n1,hola\n2,chau\n").unwrap();
        assert_eq!(table.columns(), ["id", "texto"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1], ["2", "chau"]);
    }

    #[test]
    fn test_parse_quoted_fields() {
        let source = "id,texto\r\n1,\"COND. X, KM 33\"\r\n2,\"dijo \"\"alto\"\"\nsegunda línea\"\r\n";
        let table = parse_csv(source).unwrap();
        assert_eq!(table.rows()[0][1], "COND. X, KM 33");
        assert_eq!(table.rows()[1][1], "dijo \"alto\"\nsegunda línea");
    }

    #[test]
    fn test_parse_bom_blank_lines_and_padding() {
        let source = "\u{feff}a,b\n\n1\n2,3";
        let table = parse_csv(source).unwrap();
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.rows(), [vec!["1".to_string(), String::new()], vec!["2".to_string(), "3".to_string()]]);
    }

    #[test]
    fn test_quoted_empty_field_is_a_row() {
        let table = parse_csv("texto\n\"\"\nx\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], [""]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_csv(""), Err(TableError::NoHeader)));
        assert!(matches!(
            parse_csv("a\n\"open\n"),
            Err(TableError::Csv { line: 2, .. })
        ));
        assert!(matches!(
            parse_csv("a\n1,2\n"),
            Err(TableError::Ragged { .. })
        ));
    }

    #[test]
    fn test_write_csv() {
        let table = Table::from_rows(
            vec!["id".to_string(), "Razón".to_string()],
            vec![vec!["1".to_string(), "brazo roto, PAN".to_string()]],
        )
        .unwrap();
        assert_eq!(write_csv(&table), "id,Razón\n1,\"brazo roto, PAN\"\n");
    }

    #[test]
    fn test_write_csv_renders_typed_cells() {
        let mut table = Table::new(vec!["id".to_string(), "ok".to_string(), "nota".to_string()]);
        table
            .push_row([Cell::Int(7), Cell::Bool(true), Cell::Empty])
            .unwrap();
        assert_eq!(write_csv(&table), "id,ok,nota\n7,true,\n");
    }
}
